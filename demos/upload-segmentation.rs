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
        [_, object_id, path] => {
            let connection = Connection::from_env()?;
            let object_id = object_id.parse::<u64>()?;

            let segmentation_id = vsd::helper::upload_segmentation(
                &connection,
                object_id,
                path,
                Some(Arc::new(Mutex::new(|name: Arc<String>, _: usize, pos: usize, total: usize| {
                    println!("name: {name} {pos}/{total}");
                }))),
            )
            .await?;
            println!("segmentation object: {}", segmentation_id);

            Ok(())
        }
        _ => panic!(
            "
        Please input the original object id and the segmentation file path
        Example:
            VSD_USERNAME=demo@virtualskeleton.ch VSD_PASSWORD=demo cargo run --example upload-segmentation 42 the/path/to/liver.nii
        "
        ),
    }
}
