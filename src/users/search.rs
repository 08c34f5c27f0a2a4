//! Translates validated search criteria into an ordered predicate list.
//!
//! The list is the single source of truth for both backends: it renders to a
//! parameterised SQL `WHERE` clause for PostgreSQL and evaluates directly
//! against [`Account`] values for the in-memory store.

use std::cmp::Ordering;

use serde::Serialize;
use time::{Date, Month, OffsetDateTime};

use super::repo_types::{Account, Gender};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SortField {
    FirstName,
    LastName,
    CreatedAt,
    LastLoginAt,
}

impl SortField {
    pub fn column(self) -> &'static str {
        match self {
            SortField::FirstName => "first_name",
            SortField::LastName => "last_name",
            SortField::CreatedAt => "created_at",
            SortField::LastLoginAt => "last_login_at",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn keyword(self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// Validated and defaulted search request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchCriteria {
    pub search: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub gender: Option<Gender>,
    pub min_age: Option<u32>,
    pub max_age: Option<u32>,
    pub interests: Vec<String>,
    pub skills: Vec<String>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub joined_after: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub joined_before: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_active_after: Option<OffsetDateTime>,
    pub sort_by: SortField,
    pub sort_order: SortOrder,
    pub page: u32,
    pub limit: u32,
}

impl Default for SearchCriteria {
    fn default() -> Self {
        Self {
            search: None,
            city: None,
            country: None,
            gender: None,
            min_age: None,
            max_age: None,
            interests: Vec::new(),
            skills: Vec::new(),
            joined_after: None,
            joined_before: None,
            last_active_after: None,
            sort_by: SortField::CreatedAt,
            sort_order: SortOrder::Desc,
            page: 1,
            limit: 10,
        }
    }
}

/// Value bound to a `$n` placeholder.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    Bool(bool),
    Text(String),
    Date(Date),
    Timestamp(OffsetDateTime),
    TextArray(Vec<String>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    IsActive(bool),
    /// Case-insensitive substring over first name, last name or email.
    Search(String),
    CityContains(String),
    CountryContains(String),
    GenderIs(Gender),
    BornOnOrAfter(Date),
    BornOnOrBefore(Date),
    InterestsOverlap(Vec<String>),
    SkillsOverlap(Vec<String>),
    CreatedOnOrAfter(OffsetDateTime),
    CreatedOnOrBefore(OffsetDateTime),
    LastLoginOnOrAfter(OffsetDateTime),
}

impl Predicate {
    /// Render this predicate, appending its parameters to `params`.
    pub fn render(&self, params: &mut Vec<SqlParam>) -> String {
        let mut bind = |value: SqlParam| {
            params.push(value);
            format!("${}", params.len())
        };
        match self {
            Predicate::IsActive(v) => format!("is_active = {}", bind(SqlParam::Bool(*v))),
            Predicate::Search(term) => {
                let p = bind(SqlParam::Text(like_pattern(term)));
                format!("(first_name ILIKE {p} OR last_name ILIKE {p} OR email ILIKE {p})")
            }
            Predicate::CityContains(city) => {
                format!("city ILIKE {}", bind(SqlParam::Text(like_pattern(city))))
            }
            Predicate::CountryContains(country) => {
                format!("country ILIKE {}", bind(SqlParam::Text(like_pattern(country))))
            }
            Predicate::GenderIs(g) => {
                format!("gender = {}", bind(SqlParam::Text(g.as_str().to_string())))
            }
            Predicate::BornOnOrAfter(d) => format!("date_of_birth >= {}", bind(SqlParam::Date(*d))),
            Predicate::BornOnOrBefore(d) => {
                format!("date_of_birth <= {}", bind(SqlParam::Date(*d)))
            }
            Predicate::InterestsOverlap(values) => {
                format!("interests && {}", bind(SqlParam::TextArray(values.clone())))
            }
            Predicate::SkillsOverlap(values) => {
                format!("skills && {}", bind(SqlParam::TextArray(values.clone())))
            }
            Predicate::CreatedOnOrAfter(t) => {
                format!("created_at >= {}", bind(SqlParam::Timestamp(*t)))
            }
            Predicate::CreatedOnOrBefore(t) => {
                format!("created_at <= {}", bind(SqlParam::Timestamp(*t)))
            }
            Predicate::LastLoginOnOrAfter(t) => {
                format!("last_login_at >= {}", bind(SqlParam::Timestamp(*t)))
            }
        }
    }

    /// SQL semantics evaluated in process: NULL columns never match.
    pub fn matches(&self, a: &Account) -> bool {
        match self {
            Predicate::IsActive(v) => a.is_active == *v,
            Predicate::Search(term) => {
                contains_ci(&a.first_name, term)
                    || contains_ci(&a.last_name, term)
                    || contains_ci(&a.email, term)
            }
            Predicate::CityContains(city) => a.city.as_deref().is_some_and(|c| contains_ci(c, city)),
            Predicate::CountryContains(country) => {
                a.country.as_deref().is_some_and(|c| contains_ci(c, country))
            }
            Predicate::GenderIs(g) => a.gender == Some(*g),
            Predicate::BornOnOrAfter(d) => a.date_of_birth.is_some_and(|dob| dob >= *d),
            Predicate::BornOnOrBefore(d) => a.date_of_birth.is_some_and(|dob| dob <= *d),
            Predicate::InterestsOverlap(values) => overlaps(&a.interests, values),
            Predicate::SkillsOverlap(values) => overlaps(&a.skills, values),
            Predicate::CreatedOnOrAfter(t) => a.created_at >= *t,
            Predicate::CreatedOnOrBefore(t) => a.created_at <= *t,
            Predicate::LastLoginOnOrAfter(t) => a.last_login_at.is_some_and(|at| at >= *t),
        }
    }
}

/// Store-independent description of one search.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchQuery {
    predicates: Vec<Predicate>,
    sort_by: SortField,
    sort_order: SortOrder,
    offset: i64,
    limit: i64,
}

impl SearchQuery {
    /// `today` anchors the age window; criteria are assumed already validated.
    pub fn build(c: &SearchCriteria, today: Date) -> Self {
        let mut predicates = vec![Predicate::IsActive(true)];

        if let Some(term) = non_empty(&c.search) {
            predicates.push(Predicate::Search(term.to_string()));
        }
        if let Some(city) = non_empty(&c.city) {
            predicates.push(Predicate::CityContains(city.to_string()));
        }
        if let Some(country) = non_empty(&c.country) {
            predicates.push(Predicate::CountryContains(country.to_string()));
        }
        if let Some(gender) = c.gender {
            predicates.push(Predicate::GenderIs(gender));
        }
        // Older people have earlier birth dates: max_age bounds from below.
        if let Some(max_age) = c.max_age {
            predicates.push(Predicate::BornOnOrAfter(years_before(today, max_age)));
        }
        if let Some(min_age) = c.min_age {
            predicates.push(Predicate::BornOnOrBefore(years_before(today, min_age)));
        }
        if !c.interests.is_empty() {
            predicates.push(Predicate::InterestsOverlap(c.interests.clone()));
        }
        if !c.skills.is_empty() {
            predicates.push(Predicate::SkillsOverlap(c.skills.clone()));
        }
        if let Some(t) = c.joined_after {
            predicates.push(Predicate::CreatedOnOrAfter(t));
        }
        if let Some(t) = c.joined_before {
            predicates.push(Predicate::CreatedOnOrBefore(t));
        }
        if let Some(t) = c.last_active_after {
            predicates.push(Predicate::LastLoginOnOrAfter(t));
        }

        let limit = i64::from(c.limit.max(1));
        let offset = i64::from(c.page.max(1) - 1) * limit;

        Self {
            predicates,
            sort_by: c.sort_by,
            sort_order: c.sort_order,
            offset,
            limit,
        }
    }

    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    pub fn offset(&self) -> i64 {
        self.offset
    }

    pub fn limit(&self) -> i64 {
        self.limit
    }

    pub fn sort(&self) -> (SortField, SortOrder) {
        (self.sort_by, self.sort_order)
    }

    /// `WHERE ...` fragment and the parameters it binds, in placeholder order.
    pub fn render_where(&self) -> (String, Vec<SqlParam>) {
        let mut params = Vec::new();
        let clauses: Vec<String> = self
            .predicates
            .iter()
            .map(|p| p.render(&mut params))
            .collect();
        (format!("WHERE {}", clauses.join(" AND ")), params)
    }

    pub fn count_sql(&self) -> (String, Vec<SqlParam>) {
        let (filter, params) = self.render_where();
        (format!("SELECT COUNT(*) FROM accounts {filter}"), params)
    }

    /// Page query; `columns` is the select list.
    pub fn page_sql(&self, columns: &str) -> (String, Vec<SqlParam>) {
        let (filter, params) = self.render_where();
        let sql = format!(
            "SELECT {columns} FROM accounts {filter} ORDER BY {} {} LIMIT {} OFFSET {}",
            self.sort_by.column(),
            self.sort_order.keyword(),
            self.limit,
            self.offset,
        );
        (sql, params)
    }

    pub fn matches(&self, account: &Account) -> bool {
        self.predicates.iter().all(|p| p.matches(account))
    }

    /// Ordering used by in-process evaluation; NULLs sort as the greatest value.
    pub fn compare(&self, a: &Account, b: &Account) -> Ordering {
        let ord = match self.sort_by {
            SortField::FirstName => a.first_name.cmp(&b.first_name),
            SortField::LastName => a.last_name.cmp(&b.last_name),
            SortField::CreatedAt => a.created_at.cmp(&b.created_at),
            SortField::LastLoginAt => match (a.last_login_at, b.last_login_at) {
                (Some(x), Some(y)) => x.cmp(&y),
                (None, None) => Ordering::Equal,
                (None, Some(_)) => Ordering::Greater,
                (Some(_), None) => Ordering::Less,
            },
        };
        match self.sort_order {
            SortOrder::Asc => ord,
            SortOrder::Desc => ord.reverse(),
        }
    }
}

/// Same calendar day `years` back. Feb 29 rolls to Mar 1 when the target year
/// has no leap day.
pub fn years_before(today: Date, years: u32) -> Date {
    let year = today.year() - years as i32;
    today.replace_year(year).unwrap_or_else(|_| {
        Date::from_calendar_date(year, Month::March, 1).unwrap_or(today)
    })
}

fn non_empty(v: &Option<String>) -> Option<&str> {
    v.as_deref().filter(|s| !s.is_empty())
}

fn like_pattern(term: &str) -> String {
    let mut out = String::with_capacity(term.len() + 2);
    out.push('%');
    for ch in term.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out.push('%');
    out
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

fn overlaps(have: &[String], wanted: &[String]) -> bool {
    have.iter().any(|h| wanted.contains(h))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::users::repo_types::NewAccount;
    use time::macros::{date, datetime};

    const TODAY: Date = date!(2024 - 06 - 15);

    fn account(first: &str, dob: Option<Date>) -> Account {
        let mut a = NewAccount {
            email: format!("{}@example.com", first.to_lowercase()),
            first_name: first.into(),
            last_name: "User".into(),
            password_hash: "hash".into(),
        }
        .into_account(datetime!(2024-01-01 00:00 UTC));
        a.date_of_birth = dob;
        a
    }

    #[test]
    fn empty_criteria_only_restricts_to_active() {
        let q = SearchQuery::build(&SearchCriteria::default(), TODAY);
        assert_eq!(q.predicates(), &[Predicate::IsActive(true)]);
        assert_eq!(q.sort(), (SortField::CreatedAt, SortOrder::Desc));
        assert_eq!((q.offset(), q.limit()), (0, 10));

        let (sql, params) = q.render_where();
        assert_eq!(sql, "WHERE is_active = $1");
        assert_eq!(params, vec![SqlParam::Bool(true)]);
    }

    #[test]
    fn every_filter_is_and_combined_in_order() {
        let criteria = SearchCriteria {
            search: Some("jo".into()),
            city: Some("ist".into()),
            country: Some("tur".into()),
            gender: Some(Gender::Female),
            min_age: Some(25),
            max_age: Some(35),
            interests: vec!["coding".into()],
            skills: vec!["rust".into(), "go".into()],
            joined_after: Some(datetime!(2023-01-01 00:00 UTC)),
            joined_before: Some(datetime!(2024-01-01 00:00 UTC)),
            last_active_after: Some(datetime!(2024-05-01 00:00 UTC)),
            ..SearchCriteria::default()
        };
        let q = SearchQuery::build(&criteria, TODAY);
        let (sql, params) = q.render_where();
        assert_eq!(
            sql,
            "WHERE is_active = $1 \
             AND (first_name ILIKE $2 OR last_name ILIKE $2 OR email ILIKE $2) \
             AND city ILIKE $3 AND country ILIKE $4 AND gender = $5 \
             AND date_of_birth >= $6 AND date_of_birth <= $7 \
             AND interests && $8 AND skills && $9 \
             AND created_at >= $10 AND created_at <= $11 AND last_login_at >= $12"
        );
        assert_eq!(params.len(), 12);
        assert_eq!(params[1], SqlParam::Text("%jo%".into()));
        assert_eq!(params[4], SqlParam::Text("female".into()));
        assert_eq!(params[5], SqlParam::Date(date!(1989 - 06 - 15)));
        assert_eq!(params[6], SqlParam::Date(date!(1999 - 06 - 15)));
        assert_eq!(
            params[8],
            SqlParam::TextArray(vec!["rust".into(), "go".into()])
        );
    }

    #[test]
    fn age_bounds_are_independent() {
        let only_min = SearchCriteria {
            min_age: Some(18),
            ..SearchCriteria::default()
        };
        let q = SearchQuery::build(&only_min, TODAY);
        assert_eq!(
            q.predicates()[1..],
            [Predicate::BornOnOrBefore(date!(2006 - 06 - 15))]
        );

        let only_max = SearchCriteria {
            max_age: Some(30),
            ..SearchCriteria::default()
        };
        let q = SearchQuery::build(&only_max, TODAY);
        assert_eq!(
            q.predicates()[1..],
            [Predicate::BornOnOrAfter(date!(1994 - 06 - 15))]
        );
    }

    #[test]
    fn age_window_keeps_accounts_in_range() {
        let criteria = SearchCriteria {
            min_age: Some(25),
            max_age: Some(35),
            ..SearchCriteria::default()
        };
        let q = SearchQuery::build(&criteria, TODAY);
        assert!(q.matches(&account("Thirty", Some(date!(1994 - 03 - 01)))));
        assert!(q.matches(&account("TwentyFive", Some(date!(1999 - 06 - 15)))));
        assert!(!q.matches(&account("Twenty", Some(date!(2004 - 01 - 01)))));
        assert!(!q.matches(&account("Forty", Some(date!(1984 - 01 - 01)))));
        assert!(!q.matches(&account("Unknown", None)));
    }

    #[test]
    fn leap_day_rolls_forward() {
        assert_eq!(years_before(date!(2024 - 02 - 29), 1), date!(2023 - 03 - 01));
        assert_eq!(years_before(date!(2024 - 02 - 29), 4), date!(2020 - 02 - 29));
    }

    #[test]
    fn pagination_offsets() {
        let criteria = SearchCriteria {
            page: 3,
            limit: 20,
            sort_by: SortField::FirstName,
            sort_order: SortOrder::Asc,
            ..SearchCriteria::default()
        };
        let q = SearchQuery::build(&criteria, TODAY);
        assert_eq!((q.offset(), q.limit()), (40, 20));
        let (sql, _) = q.page_sql("id");
        assert_eq!(
            sql,
            "SELECT id FROM accounts WHERE is_active = $1 ORDER BY first_name ASC LIMIT 20 OFFSET 40"
        );
        let (count, _) = q.count_sql();
        assert_eq!(count, "SELECT COUNT(*) FROM accounts WHERE is_active = $1");
    }

    #[test]
    fn like_wildcards_are_escaped() {
        assert_eq!(like_pattern("50%_off\\"), "%50\\%\\_off\\\\%");
    }

    #[test]
    fn search_matches_any_name_field_case_insensitively() {
        let q = SearchQuery::build(
            &SearchCriteria {
                search: Some("JOH".into()),
                ..SearchCriteria::default()
            },
            TODAY,
        );
        assert!(q.matches(&account("John", None)));
        let mut by_email = account("Zed", None);
        by_email.email = "johanna@example.com".into();
        assert!(q.matches(&by_email));
        assert!(!q.matches(&account("Jane", None)));
    }

    #[test]
    fn interests_match_on_overlap() {
        let q = SearchQuery::build(
            &SearchCriteria {
                interests: vec!["coding".into(), "chess".into()],
                ..SearchCriteria::default()
            },
            TODAY,
        );
        let mut coder = account("Coder", None);
        coder.interests = vec!["music".into(), "coding".into()];
        let mut musician = account("Musician", None);
        musician.interests = vec!["music".into()];
        assert!(q.matches(&coder));
        assert!(!q.matches(&musician));
    }

    #[test]
    fn inactive_accounts_never_match() {
        let q = SearchQuery::build(&SearchCriteria::default(), TODAY);
        let mut a = account("Gone", None);
        a.is_active = false;
        assert!(!q.matches(&a));
    }

    #[test]
    fn null_last_login_sorts_first_when_descending() {
        let q = SearchQuery::build(
            &SearchCriteria {
                sort_by: SortField::LastLoginAt,
                ..SearchCriteria::default()
            },
            TODAY,
        );
        let never = account("Never", None);
        let mut recent = account("Recent", None);
        recent.last_login_at = Some(datetime!(2024-06-01 00:00 UTC));
        assert_eq!(q.compare(&never, &recent), Ordering::Less);
    }
}
