use std::collections::BTreeMap;
use std::sync::Arc;

use futures::TryStreamExt;
use ipfs_lite_core::{
    Block, BlockService, BlockStore, CodecRegistry, DagService, Entry, HashAlg, Ipld, Query,
    TreeOptions,
};
use ipfs_lite_rocks::RocksDatastore;
use tempfile::TempDir;

fn dag(dir: &TempDir) -> DagService<RocksDatastore> {
    let datastore = RocksDatastore::open(dir.path()).unwrap();
    let blocks = BlockService::offline(BlockStore::new(datastore));
    DagService::new(blocks, Arc::new(CodecRegistry::new()))
}

#[tokio::test]
async fn dag_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let leaf = Ipld::String("I am 1".into());

    let root = {
        let dag = dag(&dir);
        let leaf_cid = dag.put(&leaf, "dag-cbor", None).await.unwrap();
        let root = Ipld::Map(BTreeMap::from([
            ("one".to_string(), Ipld::Link(leaf_cid)),
            ("someData".to_string(), Ipld::String("x".into())),
        ]));
        let root = dag.put(&root, "dag-cbor", None).await.unwrap();
        dag.block_service().store().close().unwrap();
        root
    };

    let dag = dag(&dir);
    let hops: Vec<_> = dag.resolve(root, "one").try_collect().await.unwrap();
    assert_eq!(hops.len(), 2);
    assert_eq!(hops[1].value, leaf);

    let paths: Vec<String> = dag
        .tree(root, None, TreeOptions::recursive())
        .try_collect()
        .await
        .unwrap();
    assert_eq!(paths, vec!["one", "someData"]);
}

#[tokio::test]
async fn block_store_over_rocks() {
    let dir = TempDir::new().unwrap();
    let store = BlockStore::new(RocksDatastore::open(dir.path()).unwrap());
    let blocks: Vec<Block> = (0u8..4)
        .map(|i| Block::new(0x55, HashAlg::Sha2_256, vec![i; 8]))
        .collect();

    store.put_many(blocks.clone()).await.unwrap();
    store.put(&blocks[0]).await.unwrap();

    for block in &blocks {
        let stored = store.get(block.cid()).await.unwrap();
        assert_eq!(&stored, block);
        assert!(stored.verify().unwrap());
    }

    let entries: Vec<Entry> = store.query(&Query::new()).try_collect().await.unwrap();
    assert_eq!(entries.len(), 4);
    let mut keys: Vec<_> = entries.iter().map(|e| e.key.clone()).collect();
    keys.sort();
    assert_eq!(keys, entries.iter().map(|e| e.key.clone()).collect::<Vec<_>>());

    store.delete(blocks[1].cid()).await.unwrap();
    assert!(store.get(blocks[1].cid()).await.unwrap_err().is_not_found());
}
