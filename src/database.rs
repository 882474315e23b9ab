use crate::error::{CatalogError, Result};
use crate::fixtures::{load_fixture, FixtureKind};
use crate::model::*;
use log::{debug, info};
use sled::transaction::{abort, TransactionError, Transactional};
use std::convert::TryInto;
use std::path::Path;

pub trait MovieDb {
    type Error;

    fn movies(&self) -> std::result::Result<Vec<Movie>, Self::Error>;

    /// Replace the record with id `id`, or append when `id` is `None`.
    /// Returns `None` when `id` names a record that does not exist.
    fn upsert_movie(
        &self,
        id: Option<u64>,
        movie: Movie,
    ) -> std::result::Result<Option<Movie>, Self::Error>;

    fn delete_movie(&self, id: u64) -> std::result::Result<Option<Movie>, Self::Error>;

    fn replace_movies(&self, movies: Vec<Movie>) -> std::result::Result<(), Self::Error>;

    fn movie_by_id(&self, id: u64) -> std::result::Result<Option<Movie>, Self::Error> {
        Ok(self.movies()?.into_iter().find(|movie| movie.id == id))
    }

    fn search_movies(&self, keyword: &str) -> std::result::Result<Vec<Movie>, Self::Error> {
        Ok(self
            .movies()?
            .into_iter()
            .filter(|movie| movie.matches_keyword(keyword))
            .collect())
    }

    fn movies_by_category(&self, category_id: u64) -> std::result::Result<Vec<Movie>, Self::Error> {
        Ok(self
            .movies()?
            .into_iter()
            .filter(|movie| movie.in_category(category_id))
            .collect())
    }
}

pub trait CategoryDb {
    type Error;

    fn categories(&self) -> std::result::Result<Vec<Category>, Self::Error>;

    fn category_by_id(&self, id: u64) -> std::result::Result<Option<Category>, Self::Error> {
        Ok(self
            .categories()?
            .into_iter()
            .find(|category| category.id == id))
    }
}

pub trait UserDb {
    type Error: From<CatalogError>;

    fn users(&self) -> std::result::Result<Vec<User>, Self::Error>;

    /// Store `user` under a freshly assigned id. `None` if the email is taken.
    fn add_user(&self, user: User) -> std::result::Result<Option<User>, Self::Error>;

    fn login(&self, email: &str, password: &str) -> std::result::Result<Option<User>, Self::Error> {
        for user in self.users()? {
            if user.email == email && verify_password(password, &user.password)? {
                return Ok(Some(user));
            }
        }
        Ok(None)
    }

    fn register(&self, new_user: NewUser) -> std::result::Result<Option<User>, Self::Error> {
        let password = bcrypt::hash(&new_user.password, bcrypt::DEFAULT_COST)
            .map_err(CatalogError::from)?;
        self.add_user(User {
            id: 0,
            username: new_user.username,
            email: new_user.email,
            password,
            role: Role::User,
            created_at: chrono::Utc::now().to_rfc3339(),
        })
    }
}

/// Everything the web handlers need from a backend.
pub trait Catalog:
    MovieDb<Error = CatalogError>
    + CategoryDb<Error = CatalogError>
    + UserDb<Error = CatalogError>
    + Send
    + Sync
    + 'static
{
}

impl<T> Catalog for T where
    T: MovieDb<Error = CatalogError>
        + CategoryDb<Error = CatalogError>
        + UserDb<Error = CatalogError>
        + Send
        + Sync
        + 'static
{
}

/// Fixture passwords are plaintext; registered ones are bcrypt hashes.
pub fn verify_password(given: &str, stored: &str) -> Result<bool> {
    if stored.starts_with("$2") {
        Ok(bcrypt::verify(given, stored)?)
    } else {
        Ok(given == stored)
    }
}

fn serialize_id(id: u64) -> [u8; 8] {
    id.to_be_bytes()
}

fn deserialize_id<V: AsRef<[u8]>>(id: V) -> Option<u64> {
    id.as_ref().try_into().ok().map(u64::from_be_bytes)
}

const MOVIES: &[u8] = b"movies";
const CATEGORIES: &[u8] = b"categories";
const USERS: &[u8] = b"users";
const USERS_EMAIL: &[u8] = b"users_email";

#[derive(Debug)]
enum Conflict {
    Id,
    Email,
}

fn decode_all<T: serde::de::DeserializeOwned>(tree: &sled::Tree) -> Result<Vec<T>> {
    tree.iter()
        .values()
        .map(|value| -> Result<T> { Ok(bincode::deserialize(&value?)?) })
        .collect()
}

fn tree_ids(tree: &sled::Tree) -> Result<Vec<u64>> {
    tree.iter()
        .keys()
        .map(|key| -> Result<u64> { Ok(deserialize_id(key?).unwrap_or(0)) })
        .collect()
}

impl MovieDb for sled::Db {
    type Error = CatalogError;

    fn movies(&self) -> Result<Vec<Movie>> {
        decode_all(&self.open_tree(MOVIES)?)
    }

    fn movie_by_id(&self, id: u64) -> Result<Option<Movie>> {
        let movies = self.open_tree(MOVIES)?;
        Ok(match movies.get(serialize_id(id))? {
            Some(data) => Some(bincode::deserialize(&data)?),
            None => None,
        })
    }

    fn upsert_movie(&self, id: Option<u64>, mut movie: Movie) -> Result<Option<Movie>> {
        let movies = self.open_tree(MOVIES)?;
        match id {
            Some(id) => {
                let existing: Movie = match movies.get(serialize_id(id))? {
                    Some(data) => bincode::deserialize(&data)?,
                    None => return Ok(None),
                };
                movie.id = id;
                if movie.created_at.is_none() {
                    movie.created_at = existing.created_at;
                }
                movies.insert(serialize_id(id), bincode::serialize(&movie)?)?;
                Ok(Some(movie))
            }
            None => {
                movie.created_at = Some(chrono::Utc::now().to_rfc3339());
                loop {
                    movie.id = next_id(tree_ids(&movies)?);
                    let encoded = bincode::serialize(&movie)?;
                    // another writer may have claimed the id in the meantime
                    if movies
                        .compare_and_swap(serialize_id(movie.id), None as Option<&[u8]>, Some(encoded))?
                        .is_ok()
                    {
                        debug!("Created movie {}", movie.id);
                        return Ok(Some(movie));
                    }
                }
            }
        }
    }

    fn delete_movie(&self, id: u64) -> Result<Option<Movie>> {
        let movies = self.open_tree(MOVIES)?;
        Ok(match movies.remove(serialize_id(id))? {
            Some(data) => Some(bincode::deserialize(&data)?),
            None => None,
        })
    }

    fn replace_movies(&self, new_movies: Vec<Movie>) -> Result<()> {
        let movies = self.open_tree(MOVIES)?;
        let mut batch = sled::Batch::default();
        for key in movies.iter().keys() {
            batch.remove(key?);
        }
        for movie in &new_movies {
            batch.insert(&serialize_id(movie.id)[..], bincode::serialize(movie)?);
        }
        movies.apply_batch(batch)?;
        Ok(())
    }
}

impl CategoryDb for sled::Db {
    type Error = CatalogError;

    fn categories(&self) -> Result<Vec<Category>> {
        decode_all(&self.open_tree(CATEGORIES)?)
    }
}

impl UserDb for sled::Db {
    type Error = CatalogError;

    fn users(&self) -> Result<Vec<User>> {
        decode_all(&self.open_tree(USERS)?)
    }

    fn add_user(&self, mut user: User) -> Result<Option<User>> {
        let users = self.open_tree(USERS)?;
        let users_email = self.open_tree(USERS_EMAIL)?;
        loop {
            user.id = next_id(tree_ids(&users)?);
            let key = serialize_id(user.id);
            let encoded = bincode::serialize(&user)?;
            let result: std::result::Result<(), TransactionError<Conflict>> =
                (&users, &users_email).transaction(|(users, users_email)| {
                    if users.get(&key[..])?.is_some() {
                        return abort(Conflict::Id);
                    }
                    if users_email
                        .insert(user.email.as_bytes(), &key[..])?
                        .is_some()
                    {
                        return abort(Conflict::Email);
                    }
                    users.insert(&key[..], encoded.clone())?;
                    Ok(())
                });
            match result {
                Ok(()) => return Ok(Some(user)),
                Err(TransactionError::Abort(Conflict::Email)) => return Ok(None),
                // another registration claimed the id first
                Err(TransactionError::Abort(Conflict::Id)) => continue,
                Err(TransactionError::Storage(err)) => return Err(err.into()),
            }
        }
    }

    fn login(&self, email: &str, password: &str) -> Result<Option<User>> {
        let users_email = self.open_tree(USERS_EMAIL)?;
        let users = self.open_tree(USERS)?;
        let id = match users_email.get(email)? {
            Some(id) => id,
            None => return Ok(None),
        };
        let user: User = match users.get(&id)? {
            Some(data) => bincode::deserialize(&data)?,
            None => return Ok(None),
        };
        if user.email == email && verify_password(password, &user.password)? {
            Ok(Some(user))
        } else {
            Ok(None)
        }
    }
}

/// Fill an empty database from the fixture documents in `dir`.
pub fn seed_from_fixtures(db: &sled::Db, dir: &Path) -> Result<()> {
    if !db.open_tree(MOVIES)?.is_empty() {
        info!("Database already populated, skipping fixtures");
        return Ok(());
    }
    let movies: Vec<Movie> = load_fixture(dir, FixtureKind::Movies)?;
    let categories: Vec<Category> = load_fixture(dir, FixtureKind::Categories)?;
    let users: Vec<User> = load_fixture(dir, FixtureKind::Users)?;

    db.replace_movies(movies)?;
    let category_tree = db.open_tree(CATEGORIES)?;
    for category in &categories {
        category_tree.insert(serialize_id(category.id), bincode::serialize(category)?)?;
    }
    let user_tree = db.open_tree(USERS)?;
    let email_tree = db.open_tree(USERS_EMAIL)?;
    for user in &users {
        user_tree.insert(serialize_id(user.id), bincode::serialize(user)?)?;
        email_tree.insert(user.email.as_bytes(), &serialize_id(user.id)[..])?;
    }
    info!(
        "Seeded {} categories and {} users from {}",
        categories.len(),
        users.len(),
        dir.display()
    );
    Ok(())
}
