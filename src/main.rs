#[rocket::main]
async fn main() -> Result<(), rocket::Error> {
    vanish::rocket().launch().await?;
    Ok(())
}
