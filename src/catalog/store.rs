//! In-memory movie storage with optimistic versioning.

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;
use dashmap::DashMap;
use thiserror::Error;

use crate::catalog::movie::{CreateMovie, Movie};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,
    #[error("edit conflict")]
    EditConflict,
}

#[derive(Debug)]
pub struct MovieStore {
    movies: DashMap<i64, Movie>,
    next_id: AtomicI64,
}

impl MovieStore {
    pub fn new() -> Self {
        Self {
            movies: DashMap::new(),
            next_id: AtomicI64::new(1),
        }
    }

    /// Build a record from a create request without storing it.
    pub fn draft(input: CreateMovie) -> Movie {
        Movie {
            id: 0,
            created_at: Utc::now(),
            title: input.title,
            year: input.year,
            runtime: input.runtime,
            genres: input.genres,
            version: 1,
        }
    }

    /// Store a drafted movie, assigning its id.
    pub fn insert(&self, mut movie: Movie) -> Movie {
        movie.id = self.next_id.fetch_add(1, Ordering::Relaxed);
        movie.version = 1;
        self.movies.insert(movie.id, movie.clone());
        movie
    }

    pub fn get(&self, id: i64) -> Result<Movie, StoreError> {
        self.movies
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or(StoreError::NotFound)
    }

    /// Replace a movie if nobody else changed it since it was read.
    ///
    /// On success `movie.version` is bumped to the stored version.
    pub fn update(&self, movie: &mut Movie) -> Result<(), StoreError> {
        // A missing row means it was deleted after the read: also a conflict.
        let mut stored = self.movies.get_mut(&movie.id).ok_or(StoreError::EditConflict)?;
        if stored.version != movie.version {
            return Err(StoreError::EditConflict);
        }
        movie.version += 1;
        *stored = movie.clone();
        Ok(())
    }

    pub fn delete(&self, id: i64) -> Result<(), StoreError> {
        self.movies
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::NotFound)
    }

    pub fn len(&self) -> usize {
        self.movies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.movies.is_empty()
    }
}

impl Default for MovieStore {
    fn default() -> Self {
        Self::new()
    }
}
