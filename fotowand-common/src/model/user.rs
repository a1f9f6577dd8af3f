use crate::model::Id;
use serde::{
    Deserialize, Deserializer, Serialize,
    de::{Error, Unexpected},
};
use thiserror::Error;
use time::UtcDateTime;

pub const USERNAME_MIN_LEN: usize = 3;
pub const USERNAME_MAX_LEN: usize = 30;
pub const BIO_MAX_LEN: usize = 150;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct UserMarker;

/// A full account as returned to its owner. Never carries credentials.
#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct User {
    pub id: Id<UserMarker>,
    pub username: Username,
    pub email: EmailAddress,
    pub profile_photo: Option<String>,
    pub bio: Bio,
    pub created_at: UtcDateTime,
}

/// The minimal user reference embedded in posts, comments and follower lists.
#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct UserSummary {
    pub id: Id<UserMarker>,
    pub username: Username,
}

/// User reference with the profile photo, as shown on story and highlight heads.
#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct UserCard {
    pub id: Id<UserMarker>,
    pub username: Username,
    pub profile_photo: Option<String>,
}

/// A profile page: the account plus both sides of its follow relationships,
/// annotated relative to the viewing user.
#[derive(Clone, Eq, PartialEq, Debug, Deserialize, Serialize)]
pub struct Profile {
    pub id: Id<UserMarker>,
    pub username: Username,
    pub email: EmailAddress,
    pub profile_photo: Option<String>,
    pub bio: Bio,
    pub followers: Vec<UserSummary>,
    pub following: Vec<UserSummary>,
    pub followers_count: usize,
    pub following_count: usize,
    pub is_following: bool,
    pub created_at: UtcDateTime,
}

/// A username search hit, annotated with the requester's follow status.
#[derive(Clone, Eq, PartialEq, Debug, Deserialize, Serialize)]
pub struct SearchedUser {
    pub id: Id<UserMarker>,
    pub username: Username,
    pub email: EmailAddress,
    pub is_following: bool,
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Serialize)]
#[serde(transparent)]
pub struct Username(String);

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("The username is invalid: {0}")]
pub struct InvalidUsernameError(String);

impl Username {
    pub fn new(username: String) -> Result<Self, InvalidUsernameError> {
        let len = username.chars().count();
        if (USERNAME_MIN_LEN..=USERNAME_MAX_LEN).contains(&len) {
            Ok(Username(username))
        } else {
            Err(InvalidUsernameError(username))
        }
    }

    #[must_use]
    pub fn get(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl<'de> Deserialize<'de> for Username {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let inner = String::deserialize(deserializer)?;
        Username::new(inner)
            .map_err(|err| Error::invalid_value(Unexpected::Str(&err.0), &"Username"))
    }
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Serialize)]
#[serde(transparent)]
pub struct EmailAddress(String);

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("The email address is invalid: {0}")]
pub struct InvalidEmailAddressError(String);

impl EmailAddress {
    /// Normalizes to lowercase and checks the `local@domain.tld` shape.
    pub fn new(email: String) -> Result<Self, InvalidEmailAddressError> {
        let normalized = email.trim().to_lowercase();

        let valid = match normalized.split_once('@') {
            Some((local, domain)) => {
                !local.is_empty()
                    && domain.contains('.')
                    && !domain.starts_with('.')
                    && !domain.ends_with('.')
                    && !normalized.contains(char::is_whitespace)
            }
            None => false,
        };

        if valid {
            Ok(EmailAddress(normalized))
        } else {
            Err(InvalidEmailAddressError(email))
        }
    }

    #[must_use]
    pub fn get(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl<'de> Deserialize<'de> for EmailAddress {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let inner = String::deserialize(deserializer)?;
        EmailAddress::new(inner)
            .map_err(|err| Error::invalid_value(Unexpected::Str(&err.0), &"EmailAddress"))
    }
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Serialize)]
#[serde(transparent)]
pub struct Bio(String);

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("The bio is too long")]
pub struct InvalidBioError(String);

impl Bio {
    pub fn new(bio: String) -> Result<Self, InvalidBioError> {
        let bio = bio.trim().to_owned();
        if bio.chars().count() <= BIO_MAX_LEN {
            Ok(Bio(bio))
        } else {
            Err(InvalidBioError(bio))
        }
    }

    #[must_use]
    pub fn get(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl<'de> Deserialize<'de> for Bio {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let inner = String::deserialize(deserializer)?;
        Bio::new(inner).map_err(|err| Error::invalid_value(Unexpected::Str(&err.0), &"Bio"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn username_length_bounds() {
        assert!(Username::new("ab".to_owned()).is_err());
        assert!(Username::new("abc".to_owned()).is_ok());
        assert!(Username::new("a".repeat(USERNAME_MAX_LEN)).is_ok());
        assert!(Username::new("a".repeat(USERNAME_MAX_LEN + 1)).is_err());
    }

    #[test]
    fn email_shape() {
        assert!(EmailAddress::new("alice@example.com".to_owned()).is_ok());
        assert!(EmailAddress::new("alice@sub.example.com".to_owned()).is_ok());
        assert!(EmailAddress::new("alice".to_owned()).is_err());
        assert!(EmailAddress::new("alice@example".to_owned()).is_err());
        assert!(EmailAddress::new("@example.com".to_owned()).is_err());
        assert!(EmailAddress::new("alice@.com".to_owned()).is_err());
        assert!(EmailAddress::new("al ice@example.com".to_owned()).is_err());
    }

    #[test]
    fn email_is_normalized() {
        let email = EmailAddress::new(" Alice@Example.COM ".to_owned()).unwrap();
        assert_eq!(email.get(), "alice@example.com");
    }

    #[test]
    fn bio_length_bound() {
        assert!(Bio::new(String::new()).is_ok());
        assert!(Bio::new("a".repeat(BIO_MAX_LEN)).is_ok());
        assert!(Bio::new("a".repeat(BIO_MAX_LEN + 1)).is_err());
    }

    #[test]
    fn bio_is_trimmed() {
        let bio = Bio::new("  hello  ".to_owned()).unwrap();
        assert_eq!(bio.get(), "hello");
    }
}
