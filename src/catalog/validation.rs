//! Field checks for movie records.

use std::collections::{BTreeMap, HashSet};

use chrono::{Datelike, Utc};

use crate::catalog::movie::Movie;

/// Collected field errors; the first message recorded for a field wins.
#[derive(Debug, Default)]
pub struct Validator {
    errors: BTreeMap<&'static str, &'static str>,
}

impl Validator {
    pub fn check(&mut self, ok: bool, field: &'static str, message: &'static str) {
        if !ok {
            self.errors.entry(field).or_insert(message);
        }
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn into_errors(self) -> BTreeMap<&'static str, &'static str> {
        self.errors
    }
}

pub fn validate_movie(v: &mut Validator, movie: &Movie) {
    v.check(!movie.title.is_empty(), "title", "must be provided");
    v.check(movie.title.len() <= 500, "title", "must not be more than 500 bytes long");

    v.check(movie.year != 0, "year", "must be provided");
    v.check(movie.year >= 1888, "year", "must be greater than 1888");
    v.check(movie.year <= Utc::now().year(), "year", "must not be in the future");

    v.check(movie.runtime.0 != 0, "runtime", "must be provided");
    v.check(movie.runtime.0 > 0, "runtime", "must be a positive integer");

    v.check(!movie.genres.is_empty(), "genres", "must contain at least 1 genre");
    v.check(movie.genres.len() <= 5, "genres", "must not contain more than 5 genres");
    let unique: HashSet<_> = movie.genres.iter().collect();
    v.check(unique.len() == movie.genres.len(), "genres", "must not contain duplicate values");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::movie::Runtime;

    fn movie() -> Movie {
        Movie {
            id: 0,
            created_at: Utc::now(),
            title: "Casablanca".into(),
            year: 1942,
            runtime: Runtime(102),
            genres: vec!["drama".into(), "romance".into()],
            version: 1,
        }
    }

    fn errors(movie: &Movie) -> BTreeMap<&'static str, &'static str> {
        let mut v = Validator::default();
        validate_movie(&mut v, movie);
        v.into_errors()
    }

    #[test]
    fn valid_movie_passes() {
        assert!(errors(&movie()).is_empty());
    }

    #[test]
    fn missing_fields_report_must_be_provided() {
        let blank = Movie {
            title: String::new(),
            year: 0,
            runtime: Runtime(0),
            genres: vec![],
            ..movie()
        };

        let errors = errors(&blank);
        assert_eq!(errors["title"], "must be provided");
        assert_eq!(errors["year"], "must be provided");
        assert_eq!(errors["runtime"], "must be provided");
        assert_eq!(errors["genres"], "must contain at least 1 genre");
    }

    #[test]
    fn range_checks() {
        let bad = Movie {
            title: "x".repeat(501),
            year: 1800,
            runtime: Runtime(-5),
            genres: vec!["a".into(), "a".into()],
            ..movie()
        };

        let errors = errors(&bad);
        assert_eq!(errors["title"], "must not be more than 500 bytes long");
        assert_eq!(errors["year"], "must be greater than 1888");
        assert_eq!(errors["runtime"], "must be a positive integer");
        assert_eq!(errors["genres"], "must not contain duplicate values");
    }

    #[test]
    fn future_years_are_rejected() {
        let future = Movie {
            year: Utc::now().year() + 1,
            ..movie()
        };
        assert_eq!(errors(&future)["year"], "must not be in the future");
    }
}
