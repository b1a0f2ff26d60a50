//! Command-line options
//!
//! Accepts `-x value`, `--long value` and `--long=value`. Unknown arguments
//! are collected rather than rejected so wrapper scripts can pass extras.

use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use crate::encoder::config::DEFAULT_CHUNK_SIZE;
use crate::encoder::EncoderConfig;
use crate::error::{Error, Result};
use crate::server::config::DEFAULT_ENDPOINT;
use crate::server::ServerConfig;

/// Usage text printed for `--help`
pub const USAGE: &str = "\
Stream an audio source over HTTP as mp3

Usage: micstream -d <DEVICE> [OPTIONS]

Options:
  -d, --device <DEVICE>         ALSA/Pulse device ID/name (required)
  -s, --sound-system <SYSTEM>   Sound system: alsa, pulse (default: alsa)
  -v, --verbose                 Verbose/debug mode
  -a, --address <ADDRESS>       Bind address (default: 0.0.0.0)
  -p, --port <PORT>             HTTP listen port (default: 8080)
  -e, --endpoint <PATH>         HTTP endpoint for streaming (default: /stream.mp3)
  -r, --sample-rate <HZ>        Recording sample rate (default: 44100)
  -b, --bitrate <KBPS>          mp3 compression bitrate, in kbps (default: 128)
  -c, --channels <N>            Number of recording channels (default: 1)
  -f, --ffmpeg <PATH>           Path to the FFmpeg binary (default: ffmpeg)
  -B, --bufsize <BYTES>         Size of the audio chunks delivered to the server (default: 8192)
  -h, --help                    Print this help
";

/// What the command line asks for
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Print usage and exit
    Help,
    /// Start streaming
    Run(Options),
}

/// Parsed streaming options
#[derive(Debug, Clone, PartialEq)]
pub struct Options {
    pub device: String,
    pub sound_system: String,
    pub verbose: bool,
    pub address: IpAddr,
    pub port: u16,
    pub endpoint: String,
    pub sample_rate: u32,
    pub bitrate: u32,
    pub channels: u16,
    pub ffmpeg: String,
    pub bufsize: usize,
    /// Arguments that were not recognized
    pub ignored: Vec<String>,
}

impl Options {
    /// Encoder settings
    pub fn encoder_config(&self) -> EncoderConfig {
        EncoderConfig::with_device(self.device.clone())
            .program(self.ffmpeg.clone())
            .input_format(self.sound_system.clone())
            .sample_rate(self.sample_rate)
            .bitrate(self.bitrate)
            .channels(self.channels)
            .chunk_size(self.bufsize)
            .verbose(self.verbose)
    }

    /// HTTP server settings
    pub fn server_config(&self) -> ServerConfig {
        ServerConfig::with_addr(SocketAddr::new(self.address, self.port))
            .endpoint(self.endpoint.clone())
    }
}

/// Parse arguments, excluding the program name
pub fn parse<I, S>(args: I) -> Result<Command>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut device = None;
    let mut options = Options {
        device: String::new(),
        sound_system: "alsa".to_string(),
        verbose: false,
        address: IpAddr::from([0, 0, 0, 0]),
        port: 8080,
        endpoint: DEFAULT_ENDPOINT.to_string(),
        sample_rate: 44100,
        bitrate: 128,
        channels: 1,
        ffmpeg: "ffmpeg".to_string(),
        bufsize: DEFAULT_CHUNK_SIZE,
        ignored: Vec::new(),
    };

    let mut args = args.into_iter().map(Into::into);

    while let Some(arg) = args.next() {
        let (flag, inline) = match arg.split_once('=') {
            Some((flag, value)) if arg.starts_with("--") => (flag.to_string(), Some(value.to_string())),
            _ => (arg.clone(), None),
        };

        let mut value = |name: &str| -> Result<String> {
            match inline.clone().or_else(|| args.next()) {
                Some(value) => Ok(value),
                None => Err(Error::InvalidArgument(format!("{} requires a value", name))),
            }
        };

        match flag.as_str() {
            "-h" | "--help" => return Ok(Command::Help),
            "-v" | "--verbose" => options.verbose = true,
            "-d" | "--device" => device = Some(value(&flag)?),
            "-s" | "--sound-system" => options.sound_system = value(&flag)?,
            "-a" | "--address" => options.address = number(&flag, &value(&flag)?)?,
            "-p" | "--port" => options.port = number(&flag, &value(&flag)?)?,
            "-e" | "--endpoint" => options.endpoint = value(&flag)?,
            "-r" | "--sample-rate" => options.sample_rate = number(&flag, &value(&flag)?)?,
            "-b" | "--bitrate" => options.bitrate = number(&flag, &value(&flag)?)?,
            "-c" | "--channels" => options.channels = number(&flag, &value(&flag)?)?,
            "-f" | "--ffmpeg" => options.ffmpeg = value(&flag)?,
            "-B" | "--bufsize" => options.bufsize = number(&flag, &value(&flag)?)?,
            _ => options.ignored.push(arg),
        }
    }

    options.device =
        device.ok_or_else(|| Error::InvalidArgument("--device is required".to_string()))?;

    if options.bufsize == 0 {
        return Err(Error::InvalidArgument("--bufsize must be positive".to_string()));
    }

    options.server_config().validate()?;

    Ok(Command::Run(options))
}

fn number<T: FromStr>(flag: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| Error::InvalidArgument(format!("invalid value for {}: {}", flag, value)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(args: &[&str]) -> Options {
        match parse(args.iter().copied()).unwrap() {
            Command::Run(options) => options,
            Command::Help => panic!("unexpected help"),
        }
    }

    #[test]
    fn test_defaults() {
        let options = run(&["-d", "hw:1,0"]);

        assert_eq!(options.device, "hw:1,0");
        assert_eq!(options.sound_system, "alsa");
        assert!(!options.verbose);
        assert_eq!(options.address, IpAddr::from([0, 0, 0, 0]));
        assert_eq!(options.port, 8080);
        assert_eq!(options.endpoint, "/stream.mp3");
        assert_eq!(options.sample_rate, 44100);
        assert_eq!(options.bitrate, 128);
        assert_eq!(options.channels, 1);
        assert_eq!(options.ffmpeg, "ffmpeg");
        assert_eq!(options.bufsize, 8192);
        assert!(options.ignored.is_empty());
    }

    #[test]
    fn test_long_and_inline_forms() {
        let options = run(&[
            "--device=default",
            "--sound-system",
            "pulse",
            "--port=9000",
            "--address",
            "127.0.0.1",
            "--endpoint=/mic.mp3",
            "--sample-rate",
            "48000",
            "--bitrate=192",
            "--channels",
            "2",
            "--ffmpeg=/opt/ffmpeg",
            "--bufsize",
            "4096",
            "--verbose",
        ]);

        assert_eq!(options.device, "default");
        assert_eq!(options.sound_system, "pulse");
        assert_eq!(options.port, 9000);
        assert_eq!(options.address, IpAddr::from([127, 0, 0, 1]));
        assert_eq!(options.endpoint, "/mic.mp3");
        assert_eq!(options.sample_rate, 48000);
        assert_eq!(options.bitrate, 192);
        assert_eq!(options.channels, 2);
        assert_eq!(options.ffmpeg, "/opt/ffmpeg");
        assert_eq!(options.bufsize, 4096);
        assert!(options.verbose);
    }

    #[test]
    fn test_short_forms_build_configs() {
        let options = run(&[
            "-d", "hw:0", "-s", "pulse", "-r", "22050", "-b", "64", "-c", "2", "-B", "1024", "-p",
            "8000", "-e", "live",
        ]);

        let encoder = options.encoder_config();
        assert_eq!(encoder.device, "hw:0");
        assert_eq!(encoder.input_format, "pulse");
        assert_eq!(encoder.sample_rate, 22050);
        assert_eq!(encoder.bitrate_kbps, 64);
        assert_eq!(encoder.channels, 2);
        assert_eq!(encoder.chunk_size, 1024);

        let server = options.server_config();
        assert_eq!(server.bind_addr.port(), 8000);
        assert_eq!(server.endpoint, "/live");
    }

    #[test]
    fn test_missing_device() {
        let result = parse(["-p", "8000"]);
        assert!(matches!(result, Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_missing_value() {
        let result = parse(["-d"]);
        assert!(matches!(result, Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_invalid_number() {
        let result = parse(["-d", "default", "--port", "eighty"]);
        assert!(matches!(result, Err(Error::InvalidArgument(_))));

        let result = parse(["-d", "default", "-B", "0"]);
        assert!(matches!(result, Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_capture_endpoint_rejected() {
        let result = parse(["-d", "default", "-e", "/:live"]);
        assert!(matches!(result, Err(Error::InvalidArgument(_))));

        let result = parse(["-d", "default", "--endpoint=/a/{x}"]);
        assert!(matches!(result, Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_help() {
        assert_eq!(parse(["--help"]).unwrap(), Command::Help);
        assert_eq!(parse(["-d", "x", "-h"]).unwrap(), Command::Help);
    }

    #[test]
    fn test_unknown_arguments_are_collected() {
        let options = run(&["-d", "default", "--extra", "-x"]);
        assert_eq!(options.ignored, vec!["--extra".to_string(), "-x".to_string()]);
    }
}
