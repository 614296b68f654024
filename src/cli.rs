// Command line interface module
// Handles parsing of command line arguments

use clap::Parser;
use std::path::PathBuf;

/// rfoto - A desktop image viewer for Wayland
#[derive(Parser, Debug)]
#[command(name = "rfoto")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Image file to open at startup
    #[arg(value_name = "IMAGE")]
    pub image_path: Option<PathBuf>,

    /// Initial window width in pixels
    #[arg(long, default_value = "800", value_parser = parse_dimension)]
    pub width: u32,

    /// Initial window height in pixels
    #[arg(long, default_value = "600", value_parser = parse_dimension)]
    pub height: u32,
}

/// Parse a window dimension and ensure it's within a sane range
fn parse_dimension(s: &str) -> Result<u32, String> {
    let value: u32 = s.parse().map_err(|_| "Invalid dimension value".to_string())?;
    if !(100..=16384).contains(&value) {
        return Err("Window dimension must be between 100 and 16384".to_string());
    }
    Ok(value)
}

/// Parse command line arguments
pub fn parse_args() -> Args {
    Args::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_invocation() {
        let args = Args::try_parse_from(["rfoto"]).unwrap();
        assert!(args.image_path.is_none());
        assert_eq!(args.width, 800);
        assert_eq!(args.height, 600);
    }

    #[test]
    fn accepts_image_path_and_size() {
        let args = Args::try_parse_from(["rfoto", "photo.jpg", "--width", "1024"]).unwrap();
        assert_eq!(args.image_path.unwrap(), PathBuf::from("photo.jpg"));
        assert_eq!(args.width, 1024);
        assert_eq!(args.height, 600);
    }

    #[test]
    fn rejects_out_of_range_dimension() {
        assert!(parse_dimension("0").is_err());
        assert!(parse_dimension("99").is_err());
        assert!(parse_dimension("100000").is_err());
        assert!(parse_dimension("abc").is_err());
        assert_eq!(parse_dimension("800"), Ok(800));
    }
}
