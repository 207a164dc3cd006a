//! Minimal CLI parsing.

use std::env;

use anyhow::{Context, Result, bail};

pub const USAGE: &str = "\
usage: fetcharr [command]

commands:
  serve                              run the scheduled wanted sweep until Ctrl-C (default)
  sweep                              run one wanted sweep and exit
  fetch movie <watch-movie-id>       fetch one watched movie
  fetch episode <watch-episode-id>   fetch one watched episode
  fetch season <watch-show-id> <n>   fetch a whole season as a single torrent
  blacklist <hash> [name]            never download this torrent again";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchCommand {
    Movie(i64),
    Episode(i64),
    Season { show_id: i64, season_number: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Serve,
    Sweep,
    Fetch(FetchCommand),
    Blacklist { hash: String, name: Option<String> },
    Help,
}

impl Command {
    pub fn from_args() -> Result<Self> {
        Self::parse(env::args().skip(1))
    }

    pub fn parse<I, S>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut args = args.into_iter().map(Into::into);
        let Some(command) = args.next() else {
            return Ok(Command::Serve);
        };

        let command = match command.as_str() {
            "serve" => Command::Serve,
            "sweep" => Command::Sweep,
            "-h" | "--help" | "help" => Command::Help,
            "fetch" => {
                let kind = args.next().context("fetch needs movie, episode or season")?;
                let id: i64 = args
                    .next()
                    .context("fetch needs a watch record id")?
                    .parse()
                    .context("watch record id must be a number")?;
                match kind.as_str() {
                    "movie" => Command::Fetch(FetchCommand::Movie(id)),
                    "episode" => Command::Fetch(FetchCommand::Episode(id)),
                    "season" => {
                        let season_number = args
                            .next()
                            .context("fetch season needs a season number")?
                            .parse()
                            .context("season number must be a non-negative number")?;
                        Command::Fetch(FetchCommand::Season {
                            show_id: id,
                            season_number,
                        })
                    }
                    other => bail!("unknown fetch kind '{}'", other),
                }
            }
            "blacklist" => {
                let hash = args.next().context("blacklist needs a torrent hash")?;
                let name = args.next();
                Command::Blacklist { hash, name }
            }
            other => bail!("unknown command '{}'", other),
        };

        if let Some(extra) = args.next() {
            bail!("unexpected argument '{}'", extra);
        }

        Ok(command)
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn test_default_is_serve() {
        assert_eq!(Command::parse(Vec::<String>::new()).unwrap(), Command::Serve);
    }

    #[test]
    fn test_fetch_commands() {
        assert_eq!(
            Command::parse(["fetch", "movie", "3"]).unwrap(),
            Command::Fetch(FetchCommand::Movie(3))
        );
        assert_eq!(
            Command::parse(["fetch", "season", "9", "2"]).unwrap(),
            Command::Fetch(FetchCommand::Season {
                show_id: 9,
                season_number: 2
            })
        );
    }

    #[test]
    fn test_blacklist_name_is_optional() {
        assert_eq!(
            Command::parse(["blacklist", "abc"]).unwrap(),
            Command::Blacklist {
                hash: "abc".to_string(),
                name: None
            }
        );
        assert_matches!(
            Command::parse(["blacklist", "abc", "Show.S01E02"]).unwrap(),
            Command::Blacklist { name: Some(_), .. }
        );
    }

    #[test]
    fn test_bad_input() {
        assert!(Command::parse(["fetch", "movie"]).is_err());
        assert!(Command::parse(["fetch", "album", "1"]).is_err());
        assert!(Command::parse(["fetch", "season", "1", "-2"]).is_err());
        assert!(Command::parse(["sweep", "now"]).is_err());
        assert!(Command::parse(["launch"]).is_err());
    }
}
