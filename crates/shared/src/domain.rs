use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

id_newtype!(GuestId);

/// A guest record as persisted by the record store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Guest {
    pub id: GuestId,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_of_birth: Option<NaiveDate>,
    pub created: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<DateTime<Utc>>,
}

impl Guest {
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }

    /// Case-insensitive substring match against first name, last name and email.
    /// `needle` must already be lowercased.
    pub fn matches_lowercase(&self, needle: &str) -> bool {
        [&self.first_name, &self.last_name, &self.email]
            .iter()
            .any(|field| field.to_lowercase().contains(needle))
    }
}

/// The editable field set of a guest, exactly as entered in the form.
///
/// Every field is submitted on create and on update; an empty optional
/// field clears the stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuestFields {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub date_of_birth: String,
}

impl GuestFields {
    pub fn new(
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        email: impl Into<String>,
    ) -> Self {
        Self {
            first_name: first_name.into(),
            last_name: last_name.into(),
            email: email.into(),
            ..Self::default()
        }
    }

    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = phone.into();
        self
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = address.into();
        self
    }

    pub fn with_date_of_birth(mut self, date_of_birth: impl Into<String>) -> Self {
        self.date_of_birth = date_of_birth.into();
        self
    }
}

impl From<&Guest> for GuestFields {
    fn from(guest: &Guest) -> Self {
        Self {
            first_name: guest.first_name.clone(),
            last_name: guest.last_name.clone(),
            email: guest.email.clone(),
            phone: guest.phone.clone().unwrap_or_default(),
            address: guest.address.clone().unwrap_or_default(),
            date_of_birth: guest
                .date_of_birth
                .map(|date| date.format("%Y-%m-%d").to_string())
                .unwrap_or_default(),
        }
    }
}

/// One page of guests, newest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuestPage {
    pub items: Vec<Guest>,
    pub page_number: u32,
    pub page_size: u32,
    pub total_items: u64,
    pub total_pages: u32,
}

impl GuestPage {
    pub fn empty(page_size: u32) -> Self {
        Self {
            items: Vec::new(),
            page_number: 1,
            page_size,
            total_items: 0,
            total_pages: 0,
        }
    }

    pub fn new(items: Vec<Guest>, page_number: u32, page_size: u32, total_items: u64) -> Self {
        Self {
            items,
            page_number,
            page_size,
            total_items,
            total_pages: total_pages(total_items, page_size),
        }
    }
}

/// `ceil(total_items / page_size)`; zero when the page size is zero.
pub fn total_pages(total_items: u64, page_size: u32) -> u32 {
    if page_size == 0 {
        return 0;
    }
    let pages = total_items.div_ceil(u64::from(page_size));
    u32::try_from(pages).unwrap_or(u32::MAX)
}
