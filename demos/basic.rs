use retrying_http::{RequestSpec, RetryingHttpClient, TracingLogger};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let url = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "https://httpbin.org/status/429,200".to_owned());

    let client = RetryingHttpClient::from_env()?.with_logger(TracingLogger);
    let response = client.request(&RequestSpec::get(url), Some(500), Some(5)).await?;

    println!("{} {}", response.status, String::from_utf8_lossy(&response.body));
    Ok(())
}
