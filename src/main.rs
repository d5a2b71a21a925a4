use moodtune::app::AppOptions;
use moodtune::model::Mood;
use std::path::PathBuf;

fn main() -> anyhow::Result<()> {
    let options = parse_args(std::env::args().skip(1).collect())?;
    let _log_guard = moodtune::logging::init_logging(&moodtune::config::log_dir()?)?;
    moodtune::app::run(options)
}

fn parse_args(args: Vec<String>) -> anyhow::Result<AppOptions> {
    let mut out = AppOptions::default();
    let mut index = 0;
    while index < args.len() {
        let flag = args[index].as_str();
        match flag {
            "--catalog" | "--folder" | "--playlist" | "--mood" => {
                index += 1;
                let Some(value) = args.get(index).map(|value| value.trim()) else {
                    anyhow::bail!("{flag} requires a value");
                };
                if value.is_empty() {
                    anyhow::bail!("{flag} cannot be empty");
                }
                match flag {
                    "--catalog" => out.catalog = Some(PathBuf::from(value)),
                    "--folder" => out.folder = Some(PathBuf::from(value)),
                    "--playlist" => out.playlist = Some(value.to_string()),
                    _ => out.mood = Some(value.parse::<Mood>()?),
                }
            }
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
    println!("moodtune");
    println!("  --catalog path     Catalog JSON (default: ~/.config/moodtune/catalog.json)");
    println!("  --folder path      Play every audio file under a folder");
    println!("  --playlist id      Play a catalog playlist by id");
    println!("  --mood name        happy, sad, neutral, anxious or angry");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn parses_paths_and_mood() {
        let options = parse_args(args(&["--folder", "/music", "--mood", "Sad"])).expect("parse");
        assert_eq!(options.folder, Some(PathBuf::from("/music")));
        assert_eq!(options.mood, Some(Mood::Sad));
    }

    #[test]
    fn rejects_missing_values_and_unknown_flags() {
        assert!(parse_args(args(&["--catalog"])).is_err());
        assert!(parse_args(args(&["--mood", "bored"])).is_err());
        assert!(parse_args(args(&["--wat"])).is_err());
    }
}
