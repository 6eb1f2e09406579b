//! Style transfer example - copies the look of a reference photo.
//!
//! Run with: `cargo run --example edit_photo -- <subject.jpg> <reference.jpg>`
//!
//! Requires `GOOGLE_API_KEY` environment variable.

use etlaa::{EditMode, GeminiClient, GenerateOutcome, SessionController};

#[tokio::main]
async fn main() -> etlaa::Result<()> {
    let mut args = std::env::args().skip(1);
    let (Some(subject), Some(reference)) = (args.next(), args.next()) else {
        eprintln!("Usage: edit_photo <subject.jpg> <reference.jpg>");
        std::process::exit(1);
    };

    let session = SessionController::new(GeminiClient::builder().build()?);
    session.upload_primary(&subject).await?;
    session.set_mode(EditMode::ReferenceStyle);
    session.upload_secondary(&reference).await?;

    session.extract_description().await?;
    println!("Style: {}", session.snapshot().prompt());

    match session.generate().await? {
        GenerateOutcome::Produced(_) => {
            let path = session.save_result(".")?;
            println!("Edited image saved to {}", path.display());
        }
        _ => println!("No image produced. Try a different reference."),
    }

    Ok(())
}
