use std::fmt::{self, Display};
use std::str::FromStr;

use chrono::NaiveDateTime;
use diesel::dsl::count;
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use serde::{Deserialize, Serialize};

use crate::schema::{taggings, tags};

/// Context every tag list is stored under
pub const TAG_CONTEXT: &str = "tags";

const DELIMITER: char = ',';

#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable, Identifiable, Serialize, Deserialize)]
#[diesel(table_name = tags)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Tag {
    pub id: i32,
    pub name: String,
}

#[derive(Insertable)]
#[diesel(table_name = taggings)]
struct TaggingInsert<'a> {
    pub tag_id: i32,
    pub taggable_id: i32,
    pub taggable_type: &'a str,
    pub context: &'a str,
    pub created_at: NaiveDateTime,
}

/// Ordered set of tag names. Names are trimmed, blanks dropped and
/// duplicates removed keeping the first occurrence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "TagListInput", into = "Vec<String>")]
pub struct TagList(Vec<String>);

#[derive(Deserialize)]
#[serde(untagged)]
enum TagListInput {
    Joined(String),
    Names(Vec<String>),
}

impl From<TagListInput> for TagList {
    fn from(input: TagListInput) -> Self {
        match input {
            TagListInput::Joined(joined) => TagList::parse(&joined),
            TagListInput::Names(names) => TagList::from_names(names),
        }
    }
}

impl From<TagList> for Vec<String> {
    fn from(list: TagList) -> Self {
        list.0
    }
}

impl TagList {
    /// Parses a comma separated list, e.g. `"chicago, shopping, fun times"`
    pub fn parse(joined: &str) -> Self {
        TagList::from_names(joined.split(DELIMITER))
    }

    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut list = TagList::default();
        for name in names {
            list.add(name.as_ref());
        }
        list
    }

    pub fn add(&mut self, name: &str) {
        let name = name.trim();
        if !name.is_empty() && !self.contains(name) {
            self.0.push(name.to_string());
        }
    }

    pub fn remove(&mut self, name: &str) {
        let name = name.trim();
        self.0.retain(|n| n != name);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.iter().any(|n| n == name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl FromStr for TagList {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(TagList::parse(s))
    }
}

impl Display for TagList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join(", "))
    }
}

impl Tag {
    pub fn find_by_name(conn: &mut SqliteConnection, tag_name: &str) -> QueryResult<Option<Tag>> {
        tags::table
            .filter(tags::name.eq(tag_name))
            .select(Tag::as_select())
            .first(conn)
            .optional()
    }

    pub fn find_or_create(conn: &mut SqliteConnection, tag_name: &str) -> QueryResult<Tag> {
        match Tag::find_by_name(conn, tag_name)? {
            Some(tag) => Ok(tag),
            None => diesel::insert_into(tags::table)
                .values(tags::name.eq(tag_name))
                .returning(Tag::as_returning())
                .get_result(conn),
        }
    }

    /// Tags attached to one record, in the order they were assigned.
    pub fn list_for(
        conn: &mut SqliteConnection,
        taggable_type: &str,
        taggable_id: i32,
    ) -> QueryResult<TagList> {
        let names: Vec<String> = taggings::table
            .inner_join(tags::table)
            .filter(taggings::taggable_type.eq(taggable_type))
            .filter(taggings::taggable_id.eq(taggable_id))
            .filter(taggings::context.eq(TAG_CONTEXT))
            .order(taggings::id.asc())
            .select(tags::name)
            .load(conn)?;

        Ok(TagList::from_names(names))
    }

    /// Replaces the tags attached to one record with `list`.
    pub fn replace_for(
        conn: &mut SqliteConnection,
        taggable_type: &str,
        taggable_id: i32,
        list: &TagList,
    ) -> QueryResult<()> {
        conn.transaction(|conn| {
            Tag::untag_all(conn, taggable_type, taggable_id)?;

            let created_at = super::now();
            for tag_name in list.iter() {
                let tag = Tag::find_or_create(conn, tag_name)?;
                diesel::insert_into(taggings::table)
                    .values(TaggingInsert {
                        tag_id: tag.id,
                        taggable_id,
                        taggable_type,
                        context: TAG_CONTEXT,
                        created_at,
                    })
                    .execute(conn)?;
            }

            Ok(())
        })
    }

    pub fn untag_all(
        conn: &mut SqliteConnection,
        taggable_type: &str,
        taggable_id: i32,
    ) -> QueryResult<usize> {
        diesel::delete(
            taggings::table
                .filter(taggings::taggable_type.eq(taggable_type))
                .filter(taggings::taggable_id.eq(taggable_id)),
        )
        .execute(conn)
    }

    /// Ids of the records of `taggable_type` tagged with `tag_name`.
    pub fn tagged_ids(
        conn: &mut SqliteConnection,
        taggable_type: &str,
        tag_name: &str,
    ) -> QueryResult<Vec<i32>> {
        taggings::table
            .inner_join(tags::table)
            .filter(tags::name.eq(tag_name.trim()))
            .filter(taggings::taggable_type.eq(taggable_type))
            .filter(taggings::context.eq(TAG_CONTEXT))
            .select(taggings::taggable_id)
            .load(conn)
    }

    /// Tags used by the given records of `taggable_type`, with the number of
    /// those records carrying each, alphabetically.
    pub fn counts_for(
        conn: &mut SqliteConnection,
        taggable_type: &str,
        taggable_ids: &[i32],
    ) -> QueryResult<Vec<(Tag, i64)>> {
        taggings::table
            .inner_join(tags::table)
            .filter(taggings::taggable_type.eq(taggable_type))
            .filter(taggings::taggable_id.eq_any(taggable_ids))
            .filter(taggings::context.eq(TAG_CONTEXT))
            .group_by((tags::id, tags::name))
            .select(((tags::id, tags::name), count(taggings::id)))
            .order(tags::name.asc())
            .load::<((i32, String), i64)>(conn)
            .map(|rows| {
                rows.into_iter()
                    .map(|((id, name), used)| (Tag { id, name }, used))
                    .collect()
            })
    }
}
