// Print the averaged report of a test as JSON.
//
// Usage: cargo run --example read_report -- <TEST_ID> [REDIS_URL]
//        cargo run --example read_report -- --latest [KEY] [REDIS_URL]

use std::env;
use std::sync::Arc;
use stressmon::reader::SnapshotReader;
use stressmon::sink::latest::DEFAULT_LATEST_KEY;
use stressmon::store::RedisStore;

fn redis_url(arg: Option<&String>) -> String {
    arg.cloned()
        .or_else(|| env::var("REDIS_URL").ok())
        .unwrap_or_else(|| "redis://127.0.0.1:6379/0".into())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().collect();
    let Some(first) = args.get(1) else {
        anyhow::bail!("usage: read_report <TEST_ID> [REDIS_URL] | --latest [KEY] [REDIS_URL]");
    };

    if first == "--latest" {
        let key = args.get(2).map(String::as_str).unwrap_or(DEFAULT_LATEST_KEY);
        let store = Arc::new(RedisStore::connect(&redis_url(args.get(3))).await?);
        match SnapshotReader::new(store).read_latest(key).await? {
            Some(snapshot) => {
                println!("{}", serde_json::to_string_pretty(&snapshot)?);
                let memory = [("vm", &snapshot.virtual_memory), ("swap", &snapshot.swap_memory)];
                for (label, m) in memory {
                    eprintln!(
                        "{}: {} / {} MB used, {} MB available",
                        label,
                        m.used_mb(),
                        m.total_mb(),
                        m.available_mb()
                    );
                }
            }
            None => eprintln!("no snapshot under {}", key),
        }
        return Ok(());
    }

    let store = Arc::new(RedisStore::connect(&redis_url(args.get(2))).await?);
    match SnapshotReader::new(store).read(first).await? {
        Some(report) => println!("{}", serde_json::to_string_pretty(&report)?),
        None => eprintln!("no ticks recorded for {}", first),
    }
    Ok(())
}
