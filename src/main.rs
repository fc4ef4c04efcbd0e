use anyhow::{Context, Result, bail};
use clap::{Arg, ArgAction, ArgMatches, Command, value_parser};
use std::path::PathBuf;
use zugzwang_vision::calibrate::calibrate_from_start_position;
use zugzwang_vision::config::DEFAULT_CONFIG_PATH;
use zugzwang_vision::diagnostics::write_artifacts;
use zugzwang_vision::locate::locate_board;
use zugzwang_vision::rectify::rectify;
use zugzwang_vision::synth::{Palette, RenderOptions, render_board};
use zugzwang_vision::{BoardState, Config, Recognizer, load_image};

fn config_arg() -> Arg {
    Arg::new("config")
        .long("config")
        .value_name("PATH")
        .help("Board config file (JSON)")
        .default_value(DEFAULT_CONFIG_PATH)
        .value_parser(value_parser!(PathBuf))
}

fn cli() -> Command {
    Command::new("zugzwang-vision")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Reads a chess position from a board image")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Debug logging (RUST_LOG overrides)"),
        )
        .subcommand(
            Command::new("recognize")
                .about("Print the FEN of the board in IMAGE")
                .arg(Arg::new("image").required(true).value_parser(value_parser!(PathBuf)))
                .arg(config_arg())
                .arg(Arg::new("theme").long("theme").value_name("NAME").help("Theme key to use"))
                .arg(
                    Arg::new("debug-dir")
                        .long("debug-dir")
                        .value_name("DIR")
                        .help("Write intermediate images and square features here")
                        .value_parser(value_parser!(PathBuf)),
                )
                .arg(
                    Arg::new("full-frame")
                        .long("full-frame")
                        .action(ArgAction::SetTrue)
                        .help("Image is already cropped to the board"),
                )
                .arg(
                    Arg::new("strict")
                        .long("strict")
                        .action(ArgAction::SetTrue)
                        .help("Fail on ambiguous squares"),
                )
                .arg(
                    Arg::new("board")
                        .long("board")
                        .action(ArgAction::SetTrue)
                        .help("Also print an ASCII diagram"),
                ),
        )
        .subcommand(
            Command::new("render")
                .about("Draw a synthetic board image for a FEN")
                .arg(Arg::new("fen").required(true))
                .arg(Arg::new("out").required(true).value_parser(value_parser!(PathBuf)))
                .arg(
                    Arg::new("palette")
                        .long("palette")
                        .default_value("walnut")
                        .value_parser(["walnut", "classic"]),
                )
                .arg(
                    Arg::new("square-size")
                        .long("square-size")
                        .default_value("80")
                        .value_parser(value_parser!(u32).range(8..)),
                ),
        )
        .subcommand(
            Command::new("calibrate")
                .about("Derive a theme from an image of the starting position")
                .arg(Arg::new("image").required(true).value_parser(value_parser!(PathBuf)))
                .arg(config_arg())
                .arg(Arg::new("name").long("name").default_value("calibrated").help("Key of the new theme")),
        )
        .subcommand(
            Command::new("init-config")
                .about("Write the default config")
                .arg(Arg::new("path").default_value(DEFAULT_CONFIG_PATH).value_parser(value_parser!(PathBuf))),
        )
}

fn path_arg<'a>(matches: &'a ArgMatches, id: &str) -> Result<&'a PathBuf> {
    matches.get_one::<PathBuf>(id).with_context(|| format!("missing <{}>", id))
}

fn str_arg<'a>(matches: &'a ArgMatches, id: &str) -> Result<&'a str> {
    matches
        .get_one::<String>(id)
        .map(String::as_str)
        .with_context(|| format!("missing <{}>", id))
}

fn recognize(matches: &ArgMatches) -> Result<()> {
    let config_path = path_arg(matches, "config")?;
    let mut config = Config::load_or_default(config_path).context("Failed to load config")?;
    if let Some(theme) = matches.get_one::<String>("theme") {
        config.select_theme(theme)?;
    }
    if matches.get_flag("full-frame") {
        config.locator.full_frame = true;
    }
    if matches.get_flag("strict") {
        config.strict = true;
    }

    let image_path = path_arg(matches, "image")?;
    let image = load_image(image_path)?;
    let recognizer = Recognizer::new(config)?;
    let analysis = recognizer
        .analyze_image(&image)
        .with_context(|| format!("Failed to recognize board in {}", image_path.display()))?;

    if let Some(dir) = matches.get_one::<PathBuf>("debug-dir") {
        write_artifacts(dir, &image, &analysis, &recognizer.config().locator)
            .context("Failed to write diagnostics")?;
    }
    if matches.get_flag("board") {
        println!("{}\n", analysis.state);
    }
    println!("{}", analysis.notation);
    Ok(())
}

fn render(matches: &ArgMatches) -> Result<()> {
    let fen = str_arg(matches, "fen")?;
    let board: BoardState = fen.parse().with_context(|| format!("Invalid FEN: {}", fen))?;
    let palette_name = str_arg(matches, "palette")?;
    let Some(palette) = Palette::by_name(palette_name) else {
        bail!("unknown palette '{}'", palette_name);
    };
    let options = RenderOptions {
        square_size: *matches.get_one::<u32>("square-size").context("missing --square-size")?,
        ..RenderOptions::default()
    };
    let out = path_arg(matches, "out")?;
    render_board(&board, &palette, &options)
        .save(out)
        .with_context(|| format!("Failed to save {}", out.display()))?;
    println!("Wrote {}", out.display());
    Ok(())
}

fn calibrate(matches: &ArgMatches) -> Result<()> {
    let config_path = path_arg(matches, "config")?;
    let mut config = Config::load_or_default(config_path).context("Failed to load config")?;
    let image = load_image(path_arg(matches, "image")?)?;
    let corners = locate_board(&image, &config.locator).context("Failed to locate board")?;
    let board = rectify(&image, &corners).context("Failed to rectify board")?;

    let calibration = calibrate_from_start_position(&board, config.active_theme()?);
    for conflict in &calibration.conflicts {
        println!("warning: {}", conflict);
    }
    let name = str_arg(matches, "name")?;
    config.themes.insert(name.to_string(), calibration.theme);
    config.theme = name.to_string();
    config
        .save(config_path)
        .with_context(|| format!("Failed to save {}", config_path.display()))?;
    println!("Theme '{}' saved to {}", name, config_path.display());
    Ok(())
}

fn init_config(matches: &ArgMatches) -> Result<()> {
    let path = path_arg(matches, "path")?;
    Config::default()
        .save(path)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    println!("Wrote {}", path.display());
    Ok(())
}

fn main() -> Result<()> {
    let matches = cli().get_matches();

    let level = if matches.get_flag("verbose") { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match matches.subcommand() {
        Some(("recognize", sub)) => recognize(sub),
        Some(("render", sub)) => render(sub),
        Some(("calibrate", sub)) => calibrate(sub),
        Some(("init-config", sub)) => init_config(sub),
        _ => bail!("unknown subcommand"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_is_well_formed() {
        cli().debug_assert();
    }

    #[test]
    fn test_recognize_flags_parse() {
        let matches = cli()
            .try_get_matches_from(["zugzwang-vision", "recognize", "board.png", "--strict", "--theme", "classic"])
            .unwrap();
        let (name, sub) = matches.subcommand().unwrap();
        assert_eq!(name, "recognize");
        assert!(sub.get_flag("strict"));
        assert!(!sub.get_flag("full-frame"));
        assert_eq!(sub.get_one::<String>("theme").map(String::as_str), Some("classic"));
        assert_eq!(path_arg(sub, "config").unwrap(), &PathBuf::from(DEFAULT_CONFIG_PATH));
    }

    #[test]
    fn test_render_rejects_tiny_squares() {
        assert!(
            cli()
                .try_get_matches_from(["zugzwang-vision", "render", "8/8/8/8/8/8/8/8", "out.png", "--square-size", "4"])
                .is_err()
        );
    }
}
