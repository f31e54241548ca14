#[tokio::main]
async fn main() {
    djavacoal_server::start_server().await;
}
