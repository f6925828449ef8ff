use anyhow::Result;
use std::env;
use std::sync::{Arc, Mutex};
use tracing_subscriber::EnvFilter;
use vsd::Connection;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = env::args().collect::<Vec<_>>();

    match args.as_slice() {
        [_, object_id, output_dir] => {
            let connection = Connection::from_env()?;

            let files = vsd::helper::download_object(
                &connection,
                object_id.parse::<u64>()?,
                output_dir,
                Some(Arc::new(Mutex::new(|name: Arc<String>, part: usize, pos: usize, total: usize| {
                    println!("name: {name} part:{part} {pos}/{total}");
                }))),
            )
            .await?;
            for file in files {
                println!("{}", file.display());
            }

            Ok(())
        }
        _ => panic!(
            "
        Please input the object id and the output directory
        Example:
            VSD_USERNAME=demo@virtualskeleton.ch VSD_PASSWORD=demo cargo run --example download-object 42 ./downloads
        "
        ),
    }
}
