use serde_derive::Deserialize;
use serde_derive::Serialize;

use crate::configuration::Config;
use crate::configuration::ConfigKey;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Author {
    User,
    Assistant,
}

impl Author {
    pub fn from_is_user(is_user: bool) -> Author {
        if is_user {
            return Author::User;
        }
        return Author::Assistant;
    }

    pub fn is_user(&self) -> bool {
        return *self == Author::User;
    }
}

impl ToString for Author {
    fn to_string(&self) -> String {
        match self {
            Author::User => return Config::get(ConfigKey::Username),
            Author::Assistant => return String::from("Assistant"),
        }
    }
}
