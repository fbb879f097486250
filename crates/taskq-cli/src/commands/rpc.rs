//! `taskq rpc` — scripted client session against the loopback transport.

use crate::config::CliConfig;
use anyhow::Context as _;
use taskq::TaskQueue;
use taskq_rpc::{Client, IndexType, LoopbackTransport, RpcError};

pub struct RpcArgs {
    /// Overrides `[rpc] loopback_latency`
    pub latency: Option<u32>,
}

/// Run the session and return one line per step
pub fn run(config: &CliConfig, args: &RpcArgs) -> anyhow::Result<Vec<String>> {
    let latency = args.latency.unwrap_or(config.rpc.loopback_latency);
    let rounds = config.rpc.max_wait_rounds;
    let mut queue = TaskQueue::with_config(config.queue.clone());
    let client = Client::new(LoopbackTransport::new(latency));
    let mut lines = Vec::new();

    client.ping(&mut queue)?.wait(&mut queue, rounds).context("ping")?;
    lines.push("ping: ok".to_string());

    client
        .create_table(&mut queue, "demo")?
        .wait(&mut queue, rounds)
        .context("create_table")?;
    let table = client
        .open_table(&mut queue, "demo")?
        .wait(&mut queue, rounds)
        .context("open_table")?;
    lines.push(format!("table demo: handle {table}"));

    // Issue all inserts before waiting on any of them.
    let mut pending = Vec::new();
    for value in ["alpha", "beta", "gamma"] {
        pending.push((value, client.insert(&mut queue, table, value.as_bytes())?));
    }
    let mut keys = Vec::new();
    for (value, mut call) in pending {
        let key = call.wait(&mut queue, rounds).context("insert")?;
        lines.push(format!("insert {value}: key {key}"));
        keys.push(key);
    }

    if let Some(&first) = keys.first() {
        client
            .write(&mut queue, table, first, b"alpha-2")?
            .wait(&mut queue, rounds)
            .context("write")?;
        let data = client
            .read(&mut queue, table, first)?
            .wait(&mut queue, rounds)
            .context("read")?;
        lines.push(format!("read {first}: {}", String::from_utf8_lossy(&data)));
    }

    let index = client
        .create_index(&mut queue, table, IndexType::Bytes, false, true)?
        .wait(&mut queue, rounds)
        .context("create_index")?;
    client
        .drop_index(&mut queue, table, index)?
        .wait(&mut queue, rounds)
        .context("drop_index")?;
    lines.push(format!("index {index}: created and dropped"));

    client
        .drop_table(&mut queue, "demo")?
        .wait(&mut queue, rounds)
        .context("drop_table")?;
    lines.push("table demo: dropped".to_string());

    match client.open_table(&mut queue, "demo")?.wait(&mut queue, rounds) {
        Err(RpcError::Server(_)) => {
            let message = client.last_error().unwrap_or_default();
            lines.push(format!("open dropped table: server error '{message}'"));
        }
        Ok(handle) => anyhow::bail!("dropped table still opens (handle {handle})"),
        Err(err) => return Err(err).context("open_table after drop"),
    }

    Ok(lines)
}

pub fn execute(config: &CliConfig, args: RpcArgs) -> anyhow::Result<()> {
    for line in run(config, &args)? {
        println!("{line}");
    }
    Ok(())
}
