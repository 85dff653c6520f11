// Publish a start/stop command to every listening monitor.
//
// Usage: cargo run --example send_command -- <start|stop> <TEST_ID> [REDIS_URL]
//   REDIS_URL  default: $REDIS_URL, then redis://127.0.0.1:6379/0

use std::env;
use std::sync::Arc;
use std::time::Duration;
use stressmon::coordination::{Command, CoordinationChannel, DEFAULT_CHANNEL};
use stressmon::store::RedisStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().collect();
    let command = match args.get(1).map(String::as_str) {
        Some("start") => Command::Start,
        Some("stop") => Command::Stop,
        _ => anyhow::bail!("usage: send_command <start|stop> <TEST_ID> [REDIS_URL]"),
    };
    let Some(test_id) = args.get(2) else {
        anyhow::bail!("missing TEST_ID");
    };
    let url = args
        .get(3)
        .cloned()
        .or_else(|| env::var("REDIS_URL").ok())
        .unwrap_or_else(|| "redis://127.0.0.1:6379/0".into());

    let store = Arc::new(RedisStore::connect(&url).await?);
    let channel = CoordinationChannel::new(store, DEFAULT_CHANNEL, Duration::from_secs(5));
    let receivers = channel.call(test_id, command).await?;
    println!("{:?} {} delivered to {} monitor(s)", command, test_id, receivers);
    Ok(())
}
