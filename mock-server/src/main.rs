use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<(), std::io::Error> {
    tracing_subscriber::fmt::init();

    let port = std::env::var("PORT").unwrap_or_else(|_| "3000".to_string());
    let addr = format!("127.0.0.1:{port}");
    let listener = TcpListener::bind(&addr).await?;
    match std::env::var("MOCK_ACCESS_TOKEN") {
        Ok(token) => mock_server::run_with_token(listener, &token).await,
        Err(_) => mock_server::run(listener).await,
    }
}
