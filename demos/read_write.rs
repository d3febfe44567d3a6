//! Write two lines to `hello.txt`, then print them back one by one.
//!
//! Run with `cargo run --example read_write`. The development preset turns
//! on debug logging, so submissions and completions are printed too.

use futures::StreamExt;
use uring_file::{File, OpenOptions, Ring, UringFileConfig};

#[tokio::main(flavor = "current_thread")]
async fn main() -> uring_file::Result<()> {
    let ring = Ring::with_config(UringFileConfig::development())?;

    let mut file = File::new(&ring, "hello.txt");
    file.open(&OpenOptions::create_write()).await?;
    file.write(b"hello\nworld").await?;
    file.close().await?;

    uring_file::with_file(&ring, "hello.txt", &OpenOptions::new(), |f| {
        Box::pin(async move {
            let mut lines = Box::pin(f.lines());
            while let Some(line) = lines.next().await {
                println!("{}", String::from_utf8_lossy(&line?));
            }
            Ok(())
        })
    })
    .await?;

    println!("{:?}", ring.stats());
    Ok(())
}
