use anyhow::Result;
use tracing_subscriber::EnvFilter;
use vsd::Connection;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let connection = Connection::from_env()?;
    let tree = connection.folder_tree().await?;

    print!("{}", tree);

    let mut paths = tree
        .iter()
        .map(|x| (x.full_name().unwrap_or(&x.name).to_owned(), x.id()))
        .collect::<Vec<_>>();
    paths.sort();
    for (path, id) in paths {
        let objects = tree
            .get(id)
            .and_then(|x| x.contained_objects())
            .map(|x| x.len())
            .unwrap_or(0);
        println!("{id:>8} {path} ({objects} objects)");
    }

    Ok(())
}
