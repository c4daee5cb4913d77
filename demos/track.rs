use std::env;
use std::error::Error;

use tracing_subscriber::EnvFilter;
use tweetstream::Client;

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let mut args = env::args().skip(1);
    let (Some(username), Some(password)) = (args.next(), args.next()) else {
        eprintln!("usage: track <username> <password> <keyword>...");
        return Ok(());
    };
    let keywords: Vec<String> = args.collect();

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        let client = Client::new(username, password);
        client
            .track(&keywords, |status| {
                println!(
                    "@{}: {}",
                    status.screen_name().unwrap_or("?"),
                    status.text().unwrap_or_default()
                );
            })
            .await?;

        Ok::<(), Box<dyn Error>>(())
    })
}
