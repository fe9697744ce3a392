use std::collections::HashSet;
use std::path::PathBuf;

use configs::MemoryConfig;
use serde_json::json;
use service::{BackendMode, Memory};

fn tmp_path(tag: &str) -> PathBuf {
    std::env::temp_dir()
        .join(format!("memory_contract_{}", uuid::Uuid::new_v4()))
        .join(format!("{tag}.json"))
}

async fn cleanup(path: &PathBuf) {
    if let Some(dir) = path.parent() {
        let _ = tokio::fs::remove_dir_all(dir).await;
    }
}

/// Nothing listens on port 1, so the probe fails fast with "connection refused".
fn unreachable_cfg(json_path: PathBuf) -> MemoryConfig {
    MemoryConfig {
        redis_host: "127.0.0.1".into(),
        redis_port: 1,
        json_path,
        connect_timeout_ms: 500,
        op_timeout_ms: 500,
        ..MemoryConfig::default()
    }
}

#[tokio::test]
async fn falls_back_to_file_when_backend_unreachable() -> Result<(), anyhow::Error> {
    let path = tmp_path("fallback");
    let mem = Memory::open(&unreachable_cfg(path.clone())).await?;

    assert_eq!(mem.mode(), BackendMode::File);
    // parent directory and seeded file exist before the first write
    assert_eq!(tokio::fs::read_to_string(&path).await?, "{}");

    assert!(mem.put("k", &json!({"v": 1})).await);
    assert_eq!(mem.get("k").await, Some(json!({"v": 1})));

    cleanup(&path).await;
    Ok(())
}

#[tokio::test]
async fn charter_scenario() -> Result<(), anyhow::Error> {
    let path = tmp_path("charter");
    let mem = Memory::file(&path).await?;

    assert!(mem.put("charter_001", &json!({"priority": "high"})).await);
    assert_eq!(mem.get("charter_001").await, Some(json!({"priority": "high"})));
    assert!(mem.list_ids().await.contains(&"charter_001".to_string()));
    assert!(mem.delete("charter_001").await);
    assert_eq!(mem.get("charter_001").await, None);

    cleanup(&path).await;
    Ok(())
}

#[tokio::test]
async fn round_trip_preserves_nested_structures() -> Result<(), anyhow::Error> {
    let path = tmp_path("nested");
    let mem = Memory::file(&path).await?;

    let complex = json!({
        "metadata": {"version": "1.0", "created_by": "planner-cell", "tags": ["important", "phase-1"]},
        "content": {
            "tasks": [
                {"id": "task_001", "status": "completed"},
                {"id": "task_002", "status": "in_progress"}
            ],
            "dependencies": {"task_002": ["task_001"]}
        },
        "statistics": {"total_tasks": 2, "success_rate": 0.5, "archived": null}
    });
    let values = [
        complex.clone(),
        json!([1, "two", 3.5, false]),
        json!("plain string"),
        json!(-17),
        json!(null),
    ];
    for (i, v) in values.iter().enumerate() {
        let key = format!("entry_{i}");
        assert!(mem.put(&key, v).await);
        assert_eq!(mem.get(&key).await.as_ref(), Some(v));
    }

    // stored verbatim, no envelope
    let raw: serde_json::Value = serde_json::from_str(&tokio::fs::read_to_string(&path).await?)?;
    assert_eq!(raw["entry_0"], complex);

    cleanup(&path).await;
    Ok(())
}

#[tokio::test]
async fn overwrite_replaces_whole_value() -> Result<(), anyhow::Error> {
    let path = tmp_path("overwrite");
    let mem = Memory::file(&path).await?;

    assert!(mem.put("k", &json!({"a": 1, "b": 2})).await);
    assert!(mem.put("k", &json!({"c": 3})).await);
    assert_eq!(mem.get("k").await, Some(json!({"c": 3})));
    assert_eq!(mem.list_ids().await, vec!["k".to_string()]);

    cleanup(&path).await;
    Ok(())
}

#[tokio::test]
async fn absent_keys_and_delete_idempotence() -> Result<(), anyhow::Error> {
    let path = tmp_path("absent");
    let mem = Memory::file(&path).await?;

    assert_eq!(mem.get("never_put").await, None);
    assert!(!mem.delete("never_put").await);

    assert!(mem.put("once", &json!(1)).await);
    assert!(mem.delete("once").await);
    assert!(!mem.delete("once").await);
    assert_eq!(mem.get("once").await, None);

    cleanup(&path).await;
    Ok(())
}

#[tokio::test]
async fn list_ids_is_exactly_the_stored_set() -> Result<(), anyhow::Error> {
    let path = tmp_path("list");
    let mem = Memory::file(&path).await?;
    assert!(mem.list_ids().await.is_empty());

    let expected: HashSet<String> = ["list_test_1", "list_test_2", "list_test_3"].iter().map(|s| s.to_string()).collect();
    for id in &expected {
        assert!(mem.put(id, &json!({"value": id})).await);
    }
    let listed: HashSet<String> = mem.list_ids().await.into_iter().collect();
    assert_eq!(listed, expected);

    cleanup(&path).await;
    Ok(())
}

#[tokio::test]
async fn clear_all_empties_the_store() -> Result<(), anyhow::Error> {
    let path = tmp_path("clear");
    let mem = Memory::file(&path).await?;

    for i in 0..5 {
        assert!(mem.put(&format!("k{i}"), &json!(i)).await);
    }
    assert!(mem.clear_all().await);
    assert!(mem.list_ids().await.is_empty());
    for i in 0..5 {
        assert_eq!(mem.get(&format!("k{i}")).await, None);
    }

    cleanup(&path).await;
    Ok(())
}

#[tokio::test]
async fn entries_survive_reopen() -> Result<(), anyhow::Error> {
    let path = tmp_path("reopen");
    {
        let mem = Memory::file(&path).await?;
        assert!(mem.put("persisted", &json!({"step": 1})).await);
    }
    let reopened = Memory::file(&path).await?;
    assert_eq!(reopened.get("persisted").await, Some(json!({"step": 1})));

    cleanup(&path).await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_puts_lose_no_write() -> Result<(), anyhow::Error> {
    let path = tmp_path("concurrent");
    let mem = Memory::file(&path).await?;

    let handles: Vec<_> = (0..32)
        .map(|i| {
            let mem = mem.clone();
            tokio::spawn(async move { mem.put(&format!("writer_{i}"), &json!({"n": i})).await })
        })
        .collect();
    for h in handles {
        assert!(h.await?);
    }

    let listed: HashSet<String> = mem.list_ids().await.into_iter().collect();
    assert_eq!(listed.len(), 32);
    for i in 0..32 {
        assert_eq!(mem.get(&format!("writer_{i}")).await, Some(json!({"n": i})));
    }

    cleanup(&path).await;
    Ok(())
}

#[tokio::test]
async fn unreadable_file_reads_as_absent_but_try_get_reports_it() -> Result<(), anyhow::Error> {
    let path = tmp_path("corrupt");
    let mem = Memory::file(&path).await?;
    assert!(mem.put("k", &json!(1)).await);

    tokio::fs::write(&path, b"{ not json").await?;

    // degraded read: indistinguishable from a missing key
    assert_eq!(mem.get("k").await, None);
    assert!(mem.list_ids().await.is_empty());
    // explicit read: the failure is visible
    assert!(mem.try_get("k").await.is_err());
    // mutations refuse to overwrite what they could not parse
    assert!(!mem.put("other", &json!(2)).await);
    assert!(!mem.delete("k").await);
    assert_eq!(tokio::fs::read(&path).await?, b"{ not json");

    // clear does not read, so it recovers the file
    assert!(mem.clear_all().await);
    assert_eq!(mem.try_get("k").await?, None);
    assert!(mem.put("other", &json!(2)).await);

    cleanup(&path).await;
    Ok(())
}

#[tokio::test]
async fn clones_share_one_backend() -> Result<(), anyhow::Error> {
    let path = tmp_path("clones");
    let a = Memory::file(&path).await?;
    let b = a.clone();

    assert!(a.put("shared", &json!("yes")).await);
    assert_eq!(b.get("shared").await, Some(json!("yes")));
    assert!(b.delete("shared").await);
    assert_eq!(a.get("shared").await, None);

    cleanup(&path).await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn two_handles_on_one_file_report_every_put_as_stored() -> Result<(), anyhow::Error> {
    let path = tmp_path("two_handles");
    let first = Memory::file(&path).await?;
    let second = Memory::file(&path).await?;

    let handles: Vec<_> = (0..200)
        .map(|i| {
            let mem = if i % 2 == 0 { first.clone() } else { second.clone() };
            tokio::spawn(async move { mem.put(&format!("k{i}"), &json!(i)).await })
        })
        .collect();
    let mut failures = 0;
    for h in handles {
        if !h.await? {
            failures += 1;
        }
    }
    assert_eq!(failures, 0);

    // independent instances may overwrite each other's entries, but the
    // file stays a complete JSON object readable by both
    let raw: serde_json::Value = serde_json::from_str(&tokio::fs::read_to_string(&path).await?)?;
    assert!(raw.is_object());
    assert!(first.try_get("k0").await.is_ok());
    assert!(second.try_get("k1").await.is_ok());

    cleanup(&path).await;
    Ok(())
}
