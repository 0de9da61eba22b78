fn main() {
    if let Err(e) = run() {
        eprintln!("cw-render failed: {e}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    use cwkit::{Generator, GeneratorConfig, WavSink};
    use std::path::PathBuf;

    #[derive(Debug)]
    struct Args {
        text: String,
        output: PathBuf,
        sample_rate: u32,
        config: GeneratorConfig,
    }

    fn parse_args() -> Result<Args, String> {
        let mut text: Option<String> = None;
        let mut output: Option<PathBuf> = None;
        let mut sample_rate: u32 = 44_100;
        let mut config = GeneratorConfig::default();

        let mut it = std::env::args().skip(1);
        while let Some(arg) = it.next() {
            match arg.as_str() {
                "--text" => {
                    let Some(v) = it.next() else {
                        return Err("missing value for --text".into());
                    };
                    text = Some(v);
                }
                "--output" => {
                    let Some(v) = it.next() else {
                        return Err("missing value for --output".into());
                    };
                    output = Some(PathBuf::from(v));
                }
                "--wpm" => {
                    let Some(v) = it.next() else {
                        return Err("missing value for --wpm".into());
                    };
                    config.speed_wpm = v
                        .parse()
                        .map_err(|_| "invalid value for --wpm".to_string())?;
                }
                "--frequency" => {
                    let Some(v) = it.next() else {
                        return Err("missing value for --frequency".into());
                    };
                    config.frequency = v
                        .parse()
                        .map_err(|_| "invalid value for --frequency".to_string())?;
                }
                "--volume" => {
                    let Some(v) = it.next() else {
                        return Err("missing value for --volume".into());
                    };
                    config.volume = v
                        .parse()
                        .map_err(|_| "invalid value for --volume".to_string())?;
                }
                "--gap" => {
                    let Some(v) = it.next() else {
                        return Err("missing value for --gap".into());
                    };
                    config.gap = v.parse().map_err(|_| "invalid value for --gap".to_string())?;
                }
                "--rate" => {
                    let Some(v) = it.next() else {
                        return Err("missing value for --rate".into());
                    };
                    sample_rate = v
                        .parse()
                        .map_err(|_| "invalid value for --rate".to_string())?;
                }
                "--help" | "-h" => {
                    println!(
                        "Usage: cw-render --text <message> --output <file.wav> \\
  [--wpm <4-60>] [--frequency <hz>] [--volume <0-100>] [--gap <0-60>] [--rate <hz>]"
                    );
                    std::process::exit(0);
                }
                other => {
                    return Err(format!("unknown argument: {other}"));
                }
            }
        }

        let Some(text) = text else {
            return Err("--text is required".into());
        };
        let Some(output) = output else {
            return Err("--output is required".into());
        };
        Ok(Args {
            text,
            output,
            sample_rate,
            config,
        })
    }

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = parse_args()?;

    let sink = WavSink::create(&args.output, args.sample_rate).map_err(|e| e.to_string())?;
    let generator =
        Generator::new(Box::new(sink), args.config.clone()).map_err(|e| e.to_string())?;

    generator
        .enqueue_string(&args.text.to_uppercase())
        .map_err(|e| e.to_string())?;
    generator.start().map_err(|e| e.to_string())?;
    generator.wait_until_drained();
    generator.stop().map_err(|e| e.to_string())?;

    println!(
        "Rendered {:?} at {} WPM to {}",
        args.text,
        args.config.speed_wpm,
        args.output.display()
    );
    Ok(())
}
