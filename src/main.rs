#[tokio::main]
async fn main() {
    if let Err(e) = imed_lib::run().await {
        eprintln!("imed-search: {e}");
        std::process::exit(1);
    }
}
