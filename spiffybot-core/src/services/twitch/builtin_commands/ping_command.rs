/// `!ping` as a dynamic command, handy for checking the bot is alive.
pub fn handle_ping() -> String {
    "pong".to_string()
}
