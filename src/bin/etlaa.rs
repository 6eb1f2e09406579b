//! CLI for Etlaa - edit photos with natural-language instructions.

use clap::{Args, Parser, Subcommand, ValueEnum};
use etlaa::{
    DescriptionModel, EditMode, EditService, ExtractOutcome, GeminiClient, GeminiModel,
    GenerateOutcome, SessionController,
};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "etlaa")]
#[command(about = "Edit photos with natural-language instructions via Gemini")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Use the stable image model instead of the preview
    #[arg(long, global = true)]
    stable_model: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Edit an image
    Edit(EditArgs),

    /// Describe the artistic style of an image
    Describe(DescribeArgs),
}

#[derive(Args)]
struct EditArgs {
    /// Primary image to edit
    primary: PathBuf,

    /// Edit mode
    #[arg(short, long, value_enum, default_value = "prompt")]
    mode: ModeArg,

    /// Secondary image (style reference or image to merge)
    #[arg(short, long)]
    secondary: Option<PathBuf>,

    /// Edit instruction or style description
    #[arg(short, long)]
    prompt: Option<String>,

    /// Extract the style description from the secondary image first
    #[arg(long)]
    extract: bool,

    /// Directory to save the edited image into
    #[arg(short, long, default_value = ".")]
    output: PathBuf,
}

#[derive(Args)]
struct DescribeArgs {
    /// Image whose style to describe
    image: PathBuf,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeArg {
    Prompt,
    Reference,
    Merge,
}

impl From<ModeArg> for EditMode {
    fn from(arg: ModeArg) -> Self {
        match arg {
            ModeArg::Prompt => EditMode::TextPrompt,
            ModeArg::Reference => EditMode::ReferenceStyle,
            ModeArg::Merge => EditMode::Merge,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let model = if cli.stable_model {
        GeminiModel::NanoBanana
    } else {
        GeminiModel::default()
    };
    let client = GeminiClient::builder()
        .model(model)
        .description_model(DescriptionModel::default())
        .build()?;

    match cli.command {
        Commands::Edit(args) => edit(client, args, cli.json).await?,
        Commands::Describe(args) => describe(client, args, cli.json).await?,
    }

    Ok(())
}

fn validate_edit_args(args: &EditArgs) -> anyhow::Result<()> {
    let mode = EditMode::from(args.mode);
    if mode.requires_secondary() && args.secondary.is_none() {
        anyhow::bail!("--mode {} requires --secondary", mode);
    }
    if args.extract && mode != EditMode::ReferenceStyle {
        anyhow::bail!("--extract is only available with --mode reference");
    }
    if !args.extract && args.prompt.as_deref().map_or(true, |p| p.trim().is_empty()) {
        anyhow::bail!("--prompt is required unless --extract is given");
    }
    Ok(())
}

async fn edit(client: GeminiClient, args: EditArgs, json_output: bool) -> anyhow::Result<()> {
    validate_edit_args(&args)?;

    let session = SessionController::new(client);
    session.upload_primary(&args.primary).await?;
    session.set_mode(args.mode.into());
    if let Some(ref secondary) = args.secondary {
        session.upload_secondary(secondary).await?;
    }
    if let Some(ref prompt) = args.prompt {
        session.set_prompt(prompt.as_str());
    }

    if args.extract {
        if let ExtractOutcome::Extracted(description) = session.extract_description().await? {
            if !json_output {
                println!("Extracted style: {}", description);
            }
        }
    }

    let outcome = match session.generate().await {
        Ok(outcome) => outcome,
        Err(e) => anyhow::bail!("{}", e.user_message()),
    };

    match outcome {
        GenerateOutcome::Produced(result) => {
            let path = session.save_result(&args.output)?;
            if json_output {
                let state = session.snapshot();
                let output = serde_json::json!({
                    "success": true,
                    "output": path.display().to_string(),
                    "mime_type": result.mime_type,
                    "mode": EditMode::from(args.mode),
                    "prompt": state.prompt(),
                    "service": session.service().name(),
                });
                println!("{}", serde_json::to_string_pretty(&output)?);
            } else {
                println!("Edited image: {} via {}", path.display(), session.service().name());
            }
        }
        _ => {
            let state = session.snapshot();
            let message = state
                .generation()
                .error
                .clone()
                .unwrap_or_else(|| etlaa::NO_IMAGE_PRODUCED_MESSAGE.to_string());
            if json_output {
                let output = serde_json::json!({ "success": false, "error": message });
                println!("{}", serde_json::to_string_pretty(&output)?);
            } else {
                eprintln!("{}", message);
            }
            std::process::exit(2);
        }
    }

    Ok(())
}

async fn describe(client: GeminiClient, args: DescribeArgs, json_output: bool) -> anyhow::Result<()> {
    let image = etlaa::decode_file(&args.image).await?;
    let description = client.extract_description(&image).await?;

    if json_output {
        let output = serde_json::json!({
            "image": image.display_name(),
            "description": description,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!("{}", description);
    }
    Ok(())
}
