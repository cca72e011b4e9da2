use std::path::PathBuf;

#[derive(Debug, Default)]
struct CliArgs {
    episodes: Option<PathBuf>,
    null_audio: bool,
}

fn main() -> anyhow::Result<()> {
    let args = parse_args(std::env::args().skip(1).collect())?;
    let settings = podcastr::config::load_settings()?;
    podcastr::logging::init(&settings)?;
    tracing::info!(?args, "starting podcastr");

    podcastr::app::run_with_startup(podcastr::app::AppStartupOptions {
        settings,
        episodes_file: args.episodes,
        null_audio: args.null_audio,
    })
}

fn parse_args(args: Vec<String>) -> anyhow::Result<CliArgs> {
    let mut out = CliArgs::default();
    let mut index = 0;
    while index < args.len() {
        match args[index].as_str() {
            "--episodes" => {
                index += 1;
                let Some(value) = args.get(index) else {
                    anyhow::bail!("--episodes requires a file path");
                };
                if value.trim().is_empty() {
                    anyhow::bail!("--episodes cannot be empty");
                }
                out.episodes = Some(PathBuf::from(value.trim()));
            }
            "--null-audio" => out.null_audio = true,
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            other => anyhow::bail!("unknown argument {other}"),
        }
        index += 1;
    }
    Ok(out)
}

fn print_help() {
    println!("podcastr");
    println!("  --episodes <file.json>  Episode catalog to list");
    println!("  --null-audio            Play without an audio device");
}
