use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Movie {
    pub id: u64,
    pub title: String,
    pub director: String,
    pub actors: Vec<String>,
    pub category: Vec<u64>,
    pub release_date: String,
    pub duration: u32,
    pub rating: f64,
    pub description: String,
    pub poster: String,
    pub banner: String,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl Movie {
    /// Case-insensitive substring match against title, director and actors.
    pub fn matches_keyword(&self, keyword: &str) -> bool {
        let keyword = keyword.to_lowercase();
        self.title.to_lowercase().contains(&keyword)
            || self.director.to_lowercase().contains(&keyword)
            || self
                .actors
                .iter()
                .any(|actor| actor.to_lowercase().contains(&keyword))
    }

    pub fn in_category(&self, category_id: u64) -> bool {
        self.category.contains(&category_id)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Category {
    pub id: u64,
    pub name: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct User {
    pub id: u64,
    pub username: String,
    pub email: String,
    pub password: String,
    pub role: Role,
    pub created_at: String,
}

/// Registration input. Passwords are hashed before a `User` is built.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password: String,
}

/// What the session keeps about the logged in user.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SessionUser {
    pub id: u64,
    pub username: String,
    pub email: String,
    pub role: Role,
}

impl From<&User> for SessionUser {
    fn from(user: &User) -> Self {
        SessionUser {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            role: user.role,
        }
    }
}

impl SessionUser {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Next free id: one past the larger of the record count and the highest id.
pub fn next_id<I: IntoIterator<Item = u64>>(ids: I) -> u64 {
    let (count, max) = ids
        .into_iter()
        .fold((0u64, 0u64), |(count, max), id| (count + 1, max.max(id)));
    count.max(max) + 1
}

/// Numeric coercion for ids that arrive as text.
pub fn parse_id(raw: &str) -> Option<u64> {
    raw.trim().parse().ok()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub fn movie(id: u64, title: &str, category: Vec<u64>) -> Movie {
        Movie {
            id,
            title: title.to_owned(),
            director: String::new(),
            actors: Vec::new(),
            category,
            release_date: "2020-01-01".to_owned(),
            duration: 100,
            rating: 7.5,
            description: String::new(),
            poster: "images/poster.jpg".to_owned(),
            banner: "images/banner.jpg".to_owned(),
            created_at: None,
        }
    }

    #[test]
    fn keyword_matching() {
        let mut m = movie(1, "Pulp Fiction", vec![1]);
        m.director = "Quentin Tarantino".to_owned();
        m.actors = vec!["John Travolta".to_owned(), "Uma Thurman".to_owned()];
        assert!(m.matches_keyword("pulp"));
        assert!(m.matches_keyword("TARANTINO"));
        assert!(m.matches_keyword("thur"));
        assert!(m.matches_keyword(""));
        assert!(!m.matches_keyword("kill bill"));
    }

    #[test]
    fn next_id_is_length_plus_one_on_dense_ids() {
        assert_eq!(next_id(vec![]), 1);
        assert_eq!(next_id(vec![1, 2, 3]), 4);
    }

    #[test]
    fn next_id_skips_past_gaps() {
        // ids 1 and 3 left after deleting 2: length + 1 would collide with 3
        assert_eq!(next_id(vec![1, 3]), 4);
    }

    #[test]
    fn role_serialization() {
        assert_eq!(serde_json::to_string(&Role::Admin).unwrap(), "\"admin\"");
        let role: Role = serde_json::from_str("\"user\"").unwrap();
        assert_eq!(role, Role::User);
    }

    #[test]
    fn parse_ids() {
        assert_eq!(parse_id(" 12 "), Some(12));
        assert_eq!(parse_id("abc"), None);
    }
}
