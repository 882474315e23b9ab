//! The admin movie editor as an explicit state machine.

use crate::database::MovieDb;
use crate::error::{CatalogError, Result};
use crate::model::{parse_id, Movie};
use log::info;
use serde::{Deserialize, Serialize};

/// The movie form as submitted: every field is raw text.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct MovieForm {
    pub id: String,
    pub title: String,
    pub director: String,
    pub actors: String,
    pub category: String,
    pub release_date: String,
    pub duration: String,
    pub rating: String,
    pub description: String,
    pub poster: String,
    pub banner: String,
}

fn split_list(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(',').map(str::trim).filter(|s| !s.is_empty())
}

impl MovieForm {
    pub fn from_movie(movie: &Movie) -> Self {
        MovieForm {
            id: movie.id.to_string(),
            title: movie.title.clone(),
            director: movie.director.clone(),
            actors: movie.actors.join(", "),
            category: movie
                .category
                .iter()
                .map(|id| id.to_string())
                .collect::<Vec<_>>()
                .join(", "),
            release_date: movie.release_date.clone(),
            duration: movie.duration.to_string(),
            rating: movie.rating.to_string(),
            description: movie.description.clone(),
            poster: movie.poster.clone(),
            banner: movie.banner.clone(),
        }
    }

    /// `None` for a new record.
    pub fn id(&self) -> Result<Option<u64>> {
        if self.id.trim().is_empty() {
            return Ok(None);
        }
        parse_id(&self.id)
            .map(Some)
            .ok_or_else(|| CatalogError::Validation(format!("invalid id {:?}", self.id)))
    }

    pub fn to_movie(&self) -> Result<Movie> {
        if self.title.trim().is_empty() {
            return Err(CatalogError::Validation("title is required".to_owned()));
        }
        let category = split_list(&self.category)
            .map(|raw| {
                parse_id(raw)
                    .ok_or_else(|| CatalogError::Validation(format!("invalid category {:?}", raw)))
            })
            .collect::<Result<Vec<_>>>()?;
        let duration = self.duration.trim().parse().map_err(|_| {
            CatalogError::Validation(format!("invalid duration {:?}", self.duration))
        })?;
        let rating = self
            .rating
            .trim()
            .parse()
            .map_err(|_| CatalogError::Validation(format!("invalid rating {:?}", self.rating)))?;
        Ok(Movie {
            id: 0,
            title: self.title.trim().to_owned(),
            director: self.director.trim().to_owned(),
            actors: split_list(&self.actors).map(str::to_owned).collect(),
            category,
            release_date: self.release_date.trim().to_owned(),
            duration,
            rating,
            description: self.description.clone(),
            poster: self.poster.trim().to_owned(),
            banner: self.banner.trim().to_owned(),
            created_at: None,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EditorState {
    Idle,
    CreatingNew {
        form: MovieForm,
        error: Option<String>,
    },
    EditingExisting {
        form: MovieForm,
        error: Option<String>,
    },
    ConfirmingDelete(Movie),
}

impl EditorState {
    /// The state a submitted form belongs to.
    pub fn for_form(form: MovieForm) -> Self {
        if form.id.trim().is_empty() {
            EditorState::CreatingNew { form, error: None }
        } else {
            EditorState::EditingExisting { form, error: None }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EditorEvent {
    New,
    Edit(u64),
    Submit(MovieForm),
    Delete(u64),
    Confirm,
    Cancel,
}

/// Banner shown after returning to the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flash {
    Saved,
    Deleted,
    Missing,
}

impl Flash {
    pub fn query_flag(self) -> &'static str {
        match self {
            Flash::Saved => "saved",
            Flash::Deleted => "deleted",
            Flash::Missing => "missing",
        }
    }
}

pub fn transition<D>(
    state: EditorState,
    event: EditorEvent,
    db: &D,
) -> Result<(EditorState, Option<Flash>)>
where
    D: MovieDb<Error = CatalogError>,
{
    Ok(match event {
        EditorEvent::New => (
            EditorState::CreatingNew {
                form: MovieForm::default(),
                error: None,
            },
            None,
        ),
        EditorEvent::Edit(id) => match db.movie_by_id(id)? {
            Some(movie) => (
                EditorState::EditingExisting {
                    form: MovieForm::from_movie(&movie),
                    error: None,
                },
                None,
            ),
            None => (EditorState::Idle, Some(Flash::Missing)),
        },
        EditorEvent::Submit(form) => submit(state, form, db)?,
        EditorEvent::Delete(id) => match db.movie_by_id(id)? {
            Some(movie) => (EditorState::ConfirmingDelete(movie), None),
            None => (EditorState::Idle, Some(Flash::Missing)),
        },
        EditorEvent::Confirm => match state {
            EditorState::ConfirmingDelete(movie) => match db.delete_movie(movie.id)? {
                Some(deleted) => {
                    info!("Deleted movie {} ({})", deleted.id, deleted.title);
                    (EditorState::Idle, Some(Flash::Deleted))
                }
                None => (EditorState::Idle, Some(Flash::Missing)),
            },
            other => (other, None),
        },
        EditorEvent::Cancel => (EditorState::Idle, None),
    })
}

fn submit<D>(state: EditorState, form: MovieForm, db: &D) -> Result<(EditorState, Option<Flash>)>
where
    D: MovieDb<Error = CatalogError>,
{
    let invalid = |form: MovieForm, err: CatalogError| -> Result<(EditorState, Option<Flash>)> {
        let error = match err {
            CatalogError::Validation(message) => Some(message),
            other => return Err(other),
        };
        Ok(match state {
            EditorState::EditingExisting { .. } => (EditorState::EditingExisting { form, error }, None),
            _ => (EditorState::CreatingNew { form, error }, None),
        })
    };
    let id = match form.id() {
        Ok(id) => id,
        Err(err) => return invalid(form, err),
    };
    let movie = match form.to_movie() {
        Ok(movie) => movie,
        Err(err) => return invalid(form, err),
    };
    Ok(match db.upsert_movie(id, movie)? {
        Some(saved) => {
            info!("Saved movie {} ({})", saved.id, saved.title);
            (EditorState::Idle, Some(Flash::Saved))
        }
        None => (EditorState::Idle, Some(Flash::Missing)),
    })
}
