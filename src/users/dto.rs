use serde::{Deserialize, Deserializer, Serialize};
use time::{
    format_description::well_known::Rfc3339, macros::format_description, Date, OffsetDateTime,
    UtcOffset,
};

use super::repo_types::{Account, Gender, PublicAccount};
use super::search::{SearchCriteria, SortField, SortOrder};
use crate::auth::dto::check_name;
use crate::error::ValidationErrors;

const PLACE_MAX: usize = 100;
const BIO_MAX: usize = 500;
const INTERESTS_MAX: usize = 10;
const SKILLS_MAX: usize = 20;
const TAG_MAX: usize = 50;
const AGE_MIN: u32 = 13;
const AGE_MAX: u32 = 120;
const LIMIT_MAX: u32 = 100;

/// Accepts a full RFC 3339 timestamp or a bare `YYYY-MM-DD` (midnight UTC).
pub(crate) fn parse_instant(raw: &str) -> Option<OffsetDateTime> {
    if let Ok(t) = OffsetDateTime::parse(raw, &Rfc3339) {
        return Some(t);
    }
    parse_date(raw).map(|d| d.midnight().assume_utc())
}

fn parse_date(raw: &str) -> Option<Date> {
    Date::parse(raw, format_description!("[year]-[month]-[day]")).ok()
}

/// Date part of either accepted form, in UTC.
pub(crate) fn parse_birth_date(raw: &str) -> Option<Date> {
    parse_date(raw).or_else(|| {
        OffsetDateTime::parse(raw, &Rfc3339)
            .ok()
            .map(|t| t.to_offset(UtcOffset::UTC).date())
    })
}

fn check_len(errors: &mut ValidationErrors, field: &'static str, value: &str, max: usize) {
    if value.chars().count() > max {
        errors.add(field, format!("must be at most {max} characters"));
    }
}

fn check_tags(errors: &mut ValidationErrors, field: &'static str, tags: &[String], max_items: usize) {
    if tags.len() > max_items {
        errors.add(field, format!("must contain at most {max_items} items"));
    }
    if tags.iter().any(|t| t.chars().count() > TAG_MAX) {
        errors.add(field, format!("each item must be at most {TAG_MAX} characters"));
    }
}

fn parse_gender(errors: &mut ValidationErrors, raw: &str) -> Option<Gender> {
    match raw.parse() {
        Ok(g) => Some(g),
        Err(_) => {
            errors.add("gender", "must be one of male, female, other");
            None
        }
    }
}

/// Absent key stays `None`; an explicit `null` becomes `Some(None)`.
fn nullable<'de, D, T>(de: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(de).map(Some)
}

/// Body of `PUT /users/profile`. Absent fields are left untouched; `null`
/// clears the optional ones.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateProfileRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub date_of_birth: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub gender: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub city: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub country: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub bio: Option<Option<String>>,
    pub interests: Option<Vec<String>>,
    pub skills: Option<Vec<String>>,
    pub is_active: Option<bool>,
}

/// Validated partial update. The outer `Option` is presence, the inner one
/// the new value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfileUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub date_of_birth: Option<Option<Date>>,
    pub gender: Option<Option<Gender>>,
    pub city: Option<Option<String>>,
    pub country: Option<Option<String>>,
    pub bio: Option<Option<String>>,
    pub interests: Option<Vec<String>>,
    pub skills: Option<Vec<String>>,
    pub is_active: Option<bool>,
}

impl UpdateProfileRequest {
    pub fn validate(self) -> Result<ProfileUpdate, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if let Some(v) = &self.first_name {
            check_name(&mut errors, "firstName", v);
        }
        if let Some(v) = &self.last_name {
            check_name(&mut errors, "lastName", v);
        }
        let date_of_birth = self.date_of_birth.as_ref().map(|value| {
            value.as_deref().and_then(|raw| {
                let parsed = parse_birth_date(raw);
                if parsed.is_none() {
                    errors.add("dateOfBirth", "must be an ISO-8601 date");
                }
                parsed
            })
        });
        let gender = self
            .gender
            .as_ref()
            .map(|value| value.as_deref().and_then(|raw| parse_gender(&mut errors, raw)));
        if let Some(Some(v)) = &self.city {
            check_len(&mut errors, "city", v, PLACE_MAX);
        }
        if let Some(Some(v)) = &self.country {
            check_len(&mut errors, "country", v, PLACE_MAX);
        }
        if let Some(Some(v)) = &self.bio {
            check_len(&mut errors, "bio", v, BIO_MAX);
        }
        if let Some(v) = &self.interests {
            check_tags(&mut errors, "interests", v, INTERESTS_MAX);
        }
        if let Some(v) = &self.skills {
            check_tags(&mut errors, "skills", v, SKILLS_MAX);
        }

        let update = ProfileUpdate {
            first_name: self.first_name,
            last_name: self.last_name,
            date_of_birth,
            gender,
            city: self.city,
            country: self.country,
            bio: self.bio,
            interests: self.interests,
            skills: self.skills,
            is_active: self.is_active,
        };
        errors.into_result(update)
    }
}

impl ProfileUpdate {
    /// Wire names of the fields this update carries, in declaration order.
    pub fn changed_fields(&self) -> Vec<&'static str> {
        let present = [
            ("firstName", self.first_name.is_some()),
            ("lastName", self.last_name.is_some()),
            ("dateOfBirth", self.date_of_birth.is_some()),
            ("gender", self.gender.is_some()),
            ("city", self.city.is_some()),
            ("country", self.country.is_some()),
            ("bio", self.bio.is_some()),
            ("interests", self.interests.is_some()),
            ("skills", self.skills.is_some()),
            ("isActive", self.is_active.is_some()),
        ];
        present
            .into_iter()
            .filter_map(|(name, set)| set.then_some(name))
            .collect()
    }

    /// Patch merge onto `account`.
    pub fn apply_to(self, account: &mut Account) {
        if let Some(v) = self.first_name {
            account.first_name = v;
        }
        if let Some(v) = self.last_name {
            account.last_name = v;
        }
        if let Some(v) = self.date_of_birth {
            account.date_of_birth = v;
        }
        if let Some(v) = self.gender {
            account.gender = v;
        }
        if let Some(v) = self.city {
            account.city = v;
        }
        if let Some(v) = self.country {
            account.country = v;
        }
        if let Some(v) = self.bio {
            account.bio = v;
        }
        if let Some(v) = self.interests {
            account.interests = v;
        }
        if let Some(v) = self.skills {
            account.skills = v;
        }
        if let Some(v) = self.is_active {
            account.is_active = v;
        }
    }
}

/// Raw query string of `GET /users/search`; list values are comma separated.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchUsersQuery {
    pub search: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub gender: Option<String>,
    pub min_age: Option<String>,
    pub max_age: Option<String>,
    pub interests: Option<String>,
    pub skills: Option<String>,
    pub joined_after: Option<String>,
    pub joined_before: Option<String>,
    pub last_active_after: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
    pub page: Option<String>,
    pub limit: Option<String>,
}

fn split_list(raw: Option<String>) -> Vec<String> {
    raw.map(|s| {
        s.split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}

fn parse_bounded(
    errors: &mut ValidationErrors,
    field: &'static str,
    raw: Option<&str>,
    min: u32,
    max: u32,
) -> Option<u32> {
    let raw = raw?;
    match raw.trim().parse::<u32>() {
        Ok(n) if (min..=max).contains(&n) => Some(n),
        _ => {
            errors.add(field, format!("must be an integer between {min} and {max}"));
            None
        }
    }
}

fn parse_when(errors: &mut ValidationErrors, field: &'static str, raw: Option<&str>) -> Option<OffsetDateTime> {
    let raw = raw?;
    let parsed = parse_instant(raw);
    if parsed.is_none() {
        errors.add(field, "must be an ISO-8601 date");
    }
    parsed
}

impl SearchUsersQuery {
    /// Parse, bound-check and default every criterion.
    pub fn validate(self) -> Result<SearchCriteria, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let defaults = SearchCriteria::default();

        let gender = self
            .gender
            .as_deref()
            .and_then(|raw| parse_gender(&mut errors, raw));
        let min_age = parse_bounded(&mut errors, "minAge", self.min_age.as_deref(), AGE_MIN, AGE_MAX);
        let max_age = parse_bounded(&mut errors, "maxAge", self.max_age.as_deref(), AGE_MIN, AGE_MAX);
        let interests = split_list(self.interests);
        let skills = split_list(self.skills);
        let joined_after = parse_when(&mut errors, "joinedAfter", self.joined_after.as_deref());
        let joined_before = parse_when(&mut errors, "joinedBefore", self.joined_before.as_deref());
        let last_active_after =
            parse_when(&mut errors, "lastActiveAfter", self.last_active_after.as_deref());

        let sort_by = match self.sort_by.as_deref() {
            None => defaults.sort_by,
            Some("firstName") => SortField::FirstName,
            Some("lastName") => SortField::LastName,
            Some("createdAt") => SortField::CreatedAt,
            Some("lastLoginAt") => SortField::LastLoginAt,
            Some(_) => {
                errors.add(
                    "sortBy",
                    "must be one of firstName, lastName, createdAt, lastLoginAt",
                );
                defaults.sort_by
            }
        };
        let sort_order = match self.sort_order.as_deref() {
            None => defaults.sort_order,
            Some("ASC") => SortOrder::Asc,
            Some("DESC") => SortOrder::Desc,
            Some(_) => {
                errors.add("sortOrder", "must be ASC or DESC");
                defaults.sort_order
            }
        };
        let page = parse_bounded(&mut errors, "page", self.page.as_deref(), 1, u32::MAX)
            .unwrap_or(defaults.page);
        let limit = parse_bounded(&mut errors, "limit", self.limit.as_deref(), 1, LIMIT_MAX)
            .unwrap_or(defaults.limit);

        let criteria = SearchCriteria {
            search: self.search,
            city: self.city,
            country: self.country,
            gender,
            min_age,
            max_age,
            interests,
            skills,
            joined_after,
            joined_before,
            last_active_after,
            sort_by,
            sort_order,
            page,
            limit,
        };
        errors.into_result(criteria)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: i64,
    pub total_pages: i64,
    pub has_next: bool,
    pub has_prev: bool,
}

impl Pagination {
    pub fn new(page: u32, limit: u32, total: i64) -> Self {
        let limit_i = i64::from(limit.max(1));
        let total_pages = (total + limit_i - 1) / limit_i;
        Self {
            page,
            limit,
            total,
            total_pages,
            has_next: i64::from(page) < total_pages,
            has_prev: page > 1,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub users: Vec<PublicAccount>,
    pub pagination: Pagination,
}

#[derive(Debug, Serialize)]
pub struct UpdateProfileResponse {
    pub message: &'static str,
    pub user: PublicAccount,
}
