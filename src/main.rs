#[actix_web::main]
async fn main() -> std::io::Result<()> {
    rentdoc_server::run().await
}
