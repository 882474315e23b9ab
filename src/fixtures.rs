//! The JSON fixture documents and the in-memory catalog built from them.
//!
//! Writes made through [`FixtureStore`] live only as long as the process;
//! every start reloads the pristine documents.

use crate::database::{CategoryDb, MovieDb, UserDb};
use crate::error::{CatalogError, Result};
use crate::model::*;
use log::{debug, info};
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::RwLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixtureKind {
    Movies,
    Categories,
    Users,
}

impl FixtureKind {
    pub const ALL: [FixtureKind; 3] = [
        FixtureKind::Movies,
        FixtureKind::Categories,
        FixtureKind::Users,
    ];

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "movies" => Some(FixtureKind::Movies),
            "categories" => Some(FixtureKind::Categories),
            "users" => Some(FixtureKind::Users),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            FixtureKind::Movies => "movies",
            FixtureKind::Categories => "categories",
            FixtureKind::Users => "users",
        }
    }

    pub fn file_name(self) -> String {
        format!("{}.json", self.name())
    }

    /// Path of the document as seen from a page at `depth`.
    pub fn relative_path(self, depth: PageDepth) -> String {
        format!("{}data/{}", depth.base_path(), self.file_name())
    }
}

/// How deep a page sits below the site root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageDepth {
    Root,
    Admin,
    Pages,
}

impl PageDepth {
    pub fn from_path(path: &str) -> Self {
        if path.contains("/admin/") {
            PageDepth::Admin
        } else if path.contains("/pages/") {
            PageDepth::Pages
        } else {
            PageDepth::Root
        }
    }

    pub fn base_path(self) -> &'static str {
        match self {
            PageDepth::Root => "",
            PageDepth::Admin => "../../",
            PageDepth::Pages => "../",
        }
    }
}

pub fn read_fixture(dir: &Path, kind: FixtureKind) -> Result<String> {
    let path = dir.join(kind.file_name());
    std::fs::read_to_string(&path).map_err(|source| CatalogError::Io { path, source })
}

pub fn load_fixture<T: DeserializeOwned>(dir: &Path, kind: FixtureKind) -> Result<Vec<T>> {
    let records: Vec<T> = serde_json::from_str(&read_fixture(dir, kind)?)?;
    debug!("Loaded {} {}", records.len(), kind.name());
    Ok(records)
}

pub struct FixtureStore {
    movies: RwLock<Vec<Movie>>,
    categories: Vec<Category>,
    users: RwLock<Vec<User>>,
}

impl FixtureStore {
    pub fn load(dir: &Path) -> Result<Self> {
        let store = FixtureStore::new(
            load_fixture(dir, FixtureKind::Movies)?,
            load_fixture(dir, FixtureKind::Categories)?,
            load_fixture(dir, FixtureKind::Users)?,
        );
        info!("Loaded fixtures from {}", dir.display());
        Ok(store)
    }

    pub fn new(movies: Vec<Movie>, categories: Vec<Category>, users: Vec<User>) -> Self {
        FixtureStore {
            movies: RwLock::new(movies),
            categories,
            users: RwLock::new(users),
        }
    }
}

impl MovieDb for FixtureStore {
    type Error = CatalogError;

    fn movies(&self) -> Result<Vec<Movie>> {
        Ok(self.movies.read().map_err(|_| CatalogError::Poisoned)?.clone())
    }

    fn upsert_movie(&self, id: Option<u64>, mut movie: Movie) -> Result<Option<Movie>> {
        let mut movies = self.movies.write().map_err(|_| CatalogError::Poisoned)?;
        match id {
            Some(id) => {
                let existing = match movies.iter_mut().find(|m| m.id == id) {
                    Some(existing) => existing,
                    None => return Ok(None),
                };
                movie.id = id;
                if movie.created_at.is_none() {
                    movie.created_at = existing.created_at.take();
                }
                *existing = movie.clone();
                Ok(Some(movie))
            }
            None => {
                movie.id = next_id(movies.iter().map(|m| m.id));
                movie.created_at = Some(chrono::Utc::now().to_rfc3339());
                movies.push(movie.clone());
                debug!("Created movie {}", movie.id);
                Ok(Some(movie))
            }
        }
    }

    fn delete_movie(&self, id: u64) -> Result<Option<Movie>> {
        let mut movies = self.movies.write().map_err(|_| CatalogError::Poisoned)?;
        Ok(match movies.iter().position(|m| m.id == id) {
            Some(index) => Some(movies.remove(index)),
            None => None,
        })
    }

    fn replace_movies(&self, new_movies: Vec<Movie>) -> Result<()> {
        *self.movies.write().map_err(|_| CatalogError::Poisoned)? = new_movies;
        Ok(())
    }
}

impl CategoryDb for FixtureStore {
    type Error = CatalogError;

    fn categories(&self) -> Result<Vec<Category>> {
        Ok(self.categories.clone())
    }
}

impl UserDb for FixtureStore {
    type Error = CatalogError;

    fn users(&self) -> Result<Vec<User>> {
        Ok(self.users.read().map_err(|_| CatalogError::Poisoned)?.clone())
    }

    fn add_user(&self, mut user: User) -> Result<Option<User>> {
        let mut users = self.users.write().map_err(|_| CatalogError::Poisoned)?;
        if users.iter().any(|u| u.email == user.email) {
            return Ok(None);
        }
        user.id = next_id(users.iter().map(|u| u.id));
        users.push(user.clone());
        Ok(Some(user))
    }
}
