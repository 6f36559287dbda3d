//! Parser for the store's `.dat` files.
//!
//! All files are `::` separated, one record per line:
//! - users.dat: userId::username
//! - movies.dat: movieId::Title (Year)::Genre|Genre
//! - ratings.dat: userId::movieId::rating::timestamp
//! - public_ratings.dat: movieId::source::value (empty or `N/A` = absent)
//!
//! Each `parse_*` function reads a file; the `parse_*_lines` variants work on
//! lines already in memory.

use crate::error::{Result, StoreError};
use crate::types::*;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::str::{FromStr, Split};

/// Read a file as lines, accepting UTF-8 or ISO-8859-1 (Latin-1).
///
/// Latin-1 is a single-byte encoding where each byte maps directly to a
/// Unicode code point, so the fallback conversion cannot fail.
fn read_lines(path: &Path) -> Result<Vec<String>> {
    let bytes = fs::read(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => StoreError::FileNotFound {
            path: path.display().to_string(),
        },
        _ => StoreError::IoError(e),
    })?;

    let content = match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(err) => err.into_bytes().iter().map(|&b| b as char).collect(),
    };

    Ok(content.lines().map(|s| s.to_string()).collect())
}

/// Field cursor over one `::` separated line, carrying error context
struct Fields<'a> {
    file: &'static str,
    line: usize,
    parts: Split<'a, &'static str>,
}

impl<'a> Fields<'a> {
    fn new(file: &'static str, line: usize, text: &'a str) -> Self {
        Self {
            file,
            line,
            parts: text.split("::"),
        }
    }

    fn error(&self, reason: String) -> StoreError {
        StoreError::ParseError {
            file: self.file.to_string(),
            line: self.line,
            reason,
        }
    }

    fn next(&mut self, name: &str) -> Result<&'a str> {
        match self.parts.next() {
            Some(value) => Ok(value.trim()),
            None => Err(self.error(format!("Missing {}", name))),
        }
    }

    fn parse<T>(&mut self, name: &str) -> Result<T>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        let raw = self.next(name)?;
        raw.parse()
            .map_err(|e| self.error(format!("Invalid {}: {}", name, e)))
    }
}

/// Iterate over non-empty lines with 1-based line numbers
fn records(lines: &[String]) -> impl Iterator<Item = (usize, &str)> {
    lines
        .iter()
        .enumerate()
        .map(|(idx, line)| (idx + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty())
}

pub fn parse_users(path: &Path) -> Result<Vec<User>> {
    parse_users_lines(&read_lines(path)?)
}

pub fn parse_users_lines(lines: &[String]) -> Result<Vec<User>> {
    records(lines)
        .map(|(line_no, line)| {
            let mut fields = Fields::new("users.dat", line_no, line);
            Ok(User {
                id: fields.parse("userId")?,
                username: fields.next("username")?.to_string(),
            })
        })
        .collect()
}

pub fn parse_movies(path: &Path) -> Result<Vec<Movie>> {
    parse_movies_lines(&read_lines(path)?)
}

pub fn parse_movies_lines(lines: &[String]) -> Result<Vec<Movie>> {
    records(lines)
        .map(|(line_no, line)| {
            let mut fields = Fields::new("movies.dat", line_no, line);
            let id = fields.parse("movieId")?;
            let title = fields.next("title")?;
            let genres = fields.next("genres")?;
            Ok(Movie {
                id,
                title: title.to_string(),
                year: extract_year_from_title(title),
                genres: parse_genres(genres)?,
            })
        })
        .collect()
}

/// Parse ratings.dat into (user, record) pairs; the timestamp is checked but
/// not kept.
pub fn parse_ratings(path: &Path) -> Result<Vec<(UserId, UserHistoryRecord)>> {
    parse_ratings_lines(&read_lines(path)?)
}

pub fn parse_ratings_lines(lines: &[String]) -> Result<Vec<(UserId, UserHistoryRecord)>> {
    records(lines)
        .map(|(line_no, line)| {
            let mut fields = Fields::new("ratings.dat", line_no, line);
            let user_id = fields.parse("userId")?;
            let movie_id = fields.parse("movieId")?;
            let rating = fields.parse("rating")?;
            let _timestamp: i64 = fields.parse("timestamp")?;
            Ok((user_id, UserHistoryRecord::new(movie_id, rating)))
        })
        .collect()
}

pub fn parse_public_ratings(path: &Path) -> Result<Vec<(MovieId, PublicRating)>> {
    parse_public_ratings_lines(&read_lines(path)?)
}

pub fn parse_public_ratings_lines(lines: &[String]) -> Result<Vec<(MovieId, PublicRating)>> {
    records(lines)
        .map(|(line_no, line)| {
            let mut fields = Fields::new("public_ratings.dat", line_no, line);
            let movie_id = fields.parse("movieId")?;
            let source = parse_source(fields.next("source")?)?;
            let raw_value = fields.next("value")?;
            let value = parse_optional_score(raw_value)
                .map_err(|reason| fields.error(reason))?;
            Ok((movie_id, PublicRating::new(source, value)))
        })
        .collect()
}

fn parse_source(s: &str) -> Result<RatingSource> {
    match s.to_ascii_lowercase().as_str() {
        "imdb" => Ok(RatingSource::Imdb),
        "douban" => Ok(RatingSource::Douban),
        "trakt" => Ok(RatingSource::Trakt),
        _ => Err(StoreError::InvalidValue {
            field: "source".to_string(),
            value: s.to_string(),
        }),
    }
}

/// Empty and `N/A` values mean the provider has no score
fn parse_optional_score(s: &str) -> std::result::Result<Option<f32>, String> {
    if s.is_empty() || s.eq_ignore_ascii_case("n/a") {
        return Ok(None);
    }
    let value = s
        .parse::<f32>()
        .map_err(|e| format!("Invalid value: {}", e))?;
    if !value.is_finite() {
        return Err(format!("Invalid value: {} is not a finite rating", s));
    }
    Ok(Some(value))
}

/// Extract year from movie title
///
/// Example: "Toy Story (1995)" -> Some(1995)
///          "Movie Title" -> None
fn extract_year_from_title(title: &str) -> Option<u16> {
    let start = title.rfind('(')?;
    let end = title.rfind(')')?;
    if start < end {
        return title[start + 1..end].parse::<u16>().ok();
    }
    None
}

/// Parse a genre string into Genre enum
///
/// Example: "Action" -> Ok(Genre::Action)
///          "Sci-Fi" -> Ok(Genre::SciFi)
fn parse_genre(s: &str) -> Result<Genre> {
    match s {
        "Action" => Ok(Genre::Action),
        "Adventure" => Ok(Genre::Adventure),
        "Animation" => Ok(Genre::Animation),
        "Children's" | "Children" => Ok(Genre::Children),
        "Comedy" => Ok(Genre::Comedy),
        "Crime" => Ok(Genre::Crime),
        "Documentary" => Ok(Genre::Documentary),
        "Drama" => Ok(Genre::Drama),
        "Fantasy" => Ok(Genre::Fantasy),
        "Film-Noir" => Ok(Genre::FilmNoir),
        "Horror" => Ok(Genre::Horror),
        "Musical" => Ok(Genre::Musical),
        "Mystery" => Ok(Genre::Mystery),
        "Romance" => Ok(Genre::Romance),
        "Sci-Fi" => Ok(Genre::SciFi),
        "Thriller" => Ok(Genre::Thriller),
        "War" => Ok(Genre::War),
        "Western" => Ok(Genre::Western),
        _ => Err(StoreError::InvalidValue {
            field: "genre".to_string(),
            value: s.to_string(),
        }),
    }
}

/// Parse pipe-separated genres; an empty field means no genres
fn parse_genres(s: &str) -> Result<Vec<Genre>> {
    s.split('|')
        .map(str::trim)
        .filter(|g| !g.is_empty())
        .map(parse_genre)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(text: &str) -> Vec<String> {
        text.lines().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_extract_year() {
        assert_eq!(extract_year_from_title("Toy Story (1995)"), Some(1995));
        assert_eq!(extract_year_from_title("Movie Title"), None);
    }

    #[test]
    fn test_parse_movies_lines() {
        let movies = parse_movies_lines(&lines(
            "1::Toy Story (1995)::Animation|Children's|Comedy\n\n2::Heat (1995)::Action|Crime",
        ))
        .unwrap();

        assert_eq!(movies.len(), 2);
        assert_eq!(movies[0].year, Some(1995));
        assert_eq!(movies[0].genres, vec![Genre::Animation, Genre::Children, Genre::Comedy]);
        assert_eq!(movies[1].id, 2);
    }

    #[test]
    fn test_parse_public_ratings_absent_values() {
        let ratings = parse_public_ratings_lines(&lines(
            "7::imdb::7.0\n7::douban::N/A\n7::trakt::",
        ))
        .unwrap();

        assert_eq!(ratings[0], (7, PublicRating::new(RatingSource::Imdb, Some(7.0))));
        assert_eq!(ratings[1].1.value, None);
        assert_eq!(ratings[2].1.value, None);
    }

    #[test]
    fn test_parse_ratings_reports_line_number() {
        let err = parse_ratings_lines(&lines("1::2::9.0::100\n1::x::8.0::100")).unwrap_err();

        match err {
            StoreError::ParseError { line, file, .. } => {
                assert_eq!(line, 2);
                assert_eq!(file, "ratings.dat");
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_parse_missing_field() {
        let err = parse_users_lines(&lines("42")).unwrap_err();
        assert!(err.to_string().contains("Missing username"));
    }

    #[test]
    fn test_non_finite_public_ratings_rejected() {
        for line in ["7::imdb::NaN", "7::douban::inf", "7::trakt::-inf"] {
            let err = parse_public_ratings_lines(&lines(line)).unwrap_err();
            assert!(matches!(err, StoreError::ParseError { line: 1, .. }), "{}", line);
        }
    }

    #[test]
    fn test_unknown_source_is_rejected() {
        assert!(parse_public_ratings_lines(&lines("7::rotten::8.0")).is_err());
    }
}
