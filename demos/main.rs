use std::env;
use std::sync::Arc;

use dmmtrie::{DMMTrie, FileValueStore, TrieConfig};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::builder().format_timestamp_secs().init();

    let data_dir = env::var("DMMTRIE_DATA_DIR").unwrap_or_else(|_| "./dmmtrie_data".to_string());
    let td = env::var("DMMTRIE_TD")
        .ok()
        .and_then(|v| v.parse::<u32>().ok());
    let tb = env::var("DMMTRIE_TB")
        .ok()
        .and_then(|v| v.parse::<u32>().ok());

    log::info!("opening trie at {data_dir}");
    let mut config = TrieConfig::development(&data_dir);
    if let Some(td) = td {
        config.delta_freeze_threshold = td;
    }
    if let Some(tb) = tb {
        config.checkpoint_threshold = tb;
    }

    let value_store = Arc::new(FileValueStore::open(
        format!("{data_dir}/values.log"),
        0,
    )?);
    let mut trie = DMMTrie::new(config, value_store)?;

    let writes: &[(u64, &[u8], &[u8])] = &[
        (1, b"ab", b"A"),
        (2, b"ac", b"B"),
        (3, b"ad", b"C"),
        (4, b"ae", b"D"),
        (5, b"af", b"E"),
    ];

    for (version, key, value) in writes {
        let ok = trie.put(0, *version, key, value)?;
        log::info!(
            "put(version={version}, key={:?}, value={:?}) -> {ok}",
            String::from_utf8_lossy(key),
            String::from_utf8_lossy(value)
        );
    }

    trie.flush()?;

    for (version, key, expected) in writes {
        let found = trie.get(0, *version, key)?;
        let key_str = String::from_utf8_lossy(key);
        match found {
            Some(value) if value == *expected => {
                println!("get(version={version}, key={key_str}) = {:?}  OK", String::from_utf8_lossy(&value));
            }
            Some(value) => {
                println!(
                    "get(version={version}, key={key_str}) = {:?}  MISMATCH (expected {:?})",
                    String::from_utf8_lossy(&value),
                    String::from_utf8_lossy(expected)
                );
            }
            None => println!("get(version={version}, key={key_str}) = <not found>"),
        }
    }

    Ok(())
}
