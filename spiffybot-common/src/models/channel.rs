/// Which channel the bot serves and which account it speaks as.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelIdentity {
    pub broadcaster_id: String,
    pub bot_user_id: String,
}

impl ChannelIdentity {
    pub fn new(broadcaster_id: &str, bot_user_id: &str) -> Self {
        Self {
            broadcaster_id: broadcaster_id.to_string(),
            bot_user_id: bot_user_id.to_string(),
        }
    }
}
