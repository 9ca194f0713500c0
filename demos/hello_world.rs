use std::rc::Rc;

use blobtree::{FsRoot, RelPath, Tree, classify, temp_tree};
use tracing_subscriber::EnvFilter;

fn main() -> blobtree::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let tmp = std::env::temp_dir().join("blobtree_hello");
    std::fs::create_dir_all(&tmp)?;
    println!("Data dir: {}", tmp.display());

    // a writeable permanent tree over `/tmp/blobtree_hello`
    let data = Tree::new(Rc::new(FsRoot::new(&tmp, true)?));
    if !data.contains("greeting.txt")? {
        data.mkfile("greeting.txt", Some(b"Hello world!\n"))?;
    }

    // nodes are classified on every lookup, never cached
    let kind = classify(data.root().as_ref(), &RelPath::parse("greeting.txt")?);
    println!("greeting.txt is a blob: {}", kind.is_blob());
    print!("{}", data.get_blob("greeting.txt")?.read_string()?);

    // build a temporary tree in the system temp dir, then hand it over
    let staging = temp_tree()?;
    staging.mkfile("a.csv", Some(b"1,2\n"))?;
    staging.mkfile("nested/b.csv", Some(b"3,4\n"))?;
    data.insert("sub", &staging)?;

    // `staging` no longer owns anything; its location now lives at `sub`
    assert!(staging.root().is_consumed());
    println!("{}", data.render(3)?);

    data.rm("sub")?;
    Ok(())
}
