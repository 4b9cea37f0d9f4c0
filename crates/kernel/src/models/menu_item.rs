//! Menu item model.
//!
//! Every mutating operation runs in one transaction that first locks the
//! menu, so concurrent edits serialize and positions stay dense.

use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use tracing::debug;
use uuid::Uuid;

use crate::menu::position::{self, Assignment, Direction, MenuError, MenuTarget, Slot};

/// Menu item record, with the slug of the referenced page when there is one.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct MenuItem {
    pub id: Uuid,
    pub label: String,
    pub url: Option<String>,
    pub page_id: Option<Uuid>,
    pub page_slug: Option<String>,
    pub position: i32,
}

/// Input for creating, updating or bulk replacing menu items.
#[derive(Debug, Clone, Deserialize)]
pub struct MenuItemInput {
    pub label: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub page_id: Option<Uuid>,
}

impl MenuItemInput {
    /// Validated label and target.
    pub fn validate(&self) -> Result<(String, MenuTarget), MenuError> {
        let label = position::validate_label(&self.label)?;
        let target = MenuTarget::from_parts(self.url.as_deref(), self.page_id)?;
        Ok((label, target))
    }
}

const SELECT: &str = r#"
    SELECT m.id, m.label, m.url, m.page_id, p.slug AS page_slug, m.position
    FROM menu_items m
    LEFT JOIN pages p ON p.id = m.page_id
"#;

impl MenuItem {
    /// Link target for rendering.
    pub fn href(&self) -> String {
        match (&self.url, &self.page_slug) {
            (Some(url), _) => url.clone(),
            (None, Some(slug)) => format!("/pages/{slug}"),
            (None, None) => "#".to_string(),
        }
    }

    /// All items in menu order.
    pub async fn find_all(pool: &PgPool) -> Result<Vec<Self>, MenuError> {
        let items = sqlx::query_as::<_, MenuItem>(&format!("{SELECT} ORDER BY m.position, m.id"))
            .fetch_all(pool)
            .await?;
        Ok(items)
    }

    /// Find a menu item by ID.
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, MenuError> {
        let item = sqlx::query_as::<_, MenuItem>(&format!("{SELECT} WHERE m.id = $1"))
            .bind(id)
            .fetch_optional(pool)
            .await?;
        Ok(item)
    }

    /// Append a new item at the end of the menu.
    pub async fn create(pool: &PgPool, input: &MenuItemInput) -> Result<Uuid, MenuError> {
        let (label, target) = input.validate()?;

        let mut tx = pool.begin().await?;
        let slots = lock_slots(&mut tx).await?;
        let id = Uuid::now_v7();
        insert(&mut tx, id, &label, &target, position::next_position(&slots)).await?;
        tx.commit().await?;

        debug!(menu_item = %id, "menu item created");
        Ok(id)
    }

    /// Change an item's label and target; its position is untouched.
    pub async fn update(pool: &PgPool, id: Uuid, input: &MenuItemInput) -> Result<(), MenuError> {
        let (label, target) = input.validate()?;

        let result = sqlx::query("UPDATE menu_items SET label = $1, url = $2, page_id = $3 WHERE id = $4")
            .bind(&label)
            .bind(target.url())
            .bind(target.page_id())
            .bind(id)
            .execute(pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(MenuError::NotFound);
        }
        Ok(())
    }

    /// Swap an item with its neighbor above or below.
    pub async fn move_item(pool: &PgPool, id: Uuid, direction: Direction) -> Result<(), MenuError> {
        let mut tx = pool.begin().await?;
        let slots = lock_slots(&mut tx).await?;
        let plan = position::plan_move(&slots, id, direction)?;
        apply(&mut tx, &plan).await?;
        tx.commit().await?;

        debug!(menu_item = %id, ?direction, "menu item moved");
        Ok(())
    }

    /// Delete an item and close the gap it leaves.
    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<(), MenuError> {
        let mut tx = pool.begin().await?;
        let slots = lock_slots(&mut tx).await?;
        let plan = position::plan_delete(&slots, id)?;

        sqlx::query("DELETE FROM menu_items WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        apply(&mut tx, &plan).await?;
        tx.commit().await?;

        debug!(menu_item = %id, shifted = plan.len(), "menu item deleted");
        Ok(())
    }

    /// Replace the whole menu with `entries`, in order.
    ///
    /// Nothing is written unless every entry is valid.
    pub async fn replace_all(pool: &PgPool, entries: &[MenuItemInput]) -> Result<(), MenuError> {
        let validated = entries
            .iter()
            .map(MenuItemInput::validate)
            .collect::<Result<Vec<_>, _>>()?;

        let mut tx = pool.begin().await?;
        lock_slots(&mut tx).await?;
        sqlx::query("DELETE FROM menu_items").execute(&mut *tx).await?;
        for ((label, target), pos) in position::plan_replace(validated) {
            insert(&mut tx, Uuid::now_v7(), &label, &target, pos).await?;
        }
        tx.commit().await?;

        debug!(count = entries.len(), "menu replaced");
        Ok(())
    }

    /// Number of items pointing at a page.
    pub async fn count_for_page(pool: &PgPool, page_id: Uuid) -> Result<i64, MenuError> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM menu_items WHERE page_id = $1")
            .bind(page_id)
            .fetch_one(pool)
            .await?;
        Ok(count.0)
    }
}

/// Lock the menu for the rest of the transaction and read its slots.
///
/// A table lock rather than row locks, so that two appends to an empty menu
/// also serialize.
async fn lock_slots(conn: &mut PgConnection) -> Result<Vec<Slot>, MenuError> {
    sqlx::query("LOCK TABLE menu_items IN EXCLUSIVE MODE")
        .execute(&mut *conn)
        .await?;
    let slots =
        sqlx::query_as::<_, Slot>("SELECT id, position FROM menu_items ORDER BY position, id")
            .fetch_all(&mut *conn)
            .await?;
    Ok(slots)
}

async fn insert(
    conn: &mut PgConnection,
    id: Uuid,
    label: &str,
    target: &MenuTarget,
    position: i32,
) -> Result<(), MenuError> {
    sqlx::query("INSERT INTO menu_items (id, label, url, page_id, position) VALUES ($1, $2, $3, $4, $5)")
        .bind(id)
        .bind(label)
        .bind(target.url())
        .bind(target.page_id())
        .bind(position)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

async fn apply(conn: &mut PgConnection, plan: &[Assignment]) -> Result<(), MenuError> {
    for (id, position) in plan {
        sqlx::query("UPDATE menu_items SET position = $1 WHERE id = $2")
            .bind(position)
            .bind(id)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(url: Option<&str>, page_slug: Option<&str>) -> MenuItem {
        MenuItem {
            id: Uuid::now_v7(),
            label: "x".into(),
            url: url.map(String::from),
            page_id: page_slug.map(|_| Uuid::now_v7()),
            page_slug: page_slug.map(String::from),
            position: 0,
        }
    }

    #[test]
    fn href_prefers_url_then_page() {
        assert_eq!(item(Some("https://a.io"), None).href(), "https://a.io");
        assert_eq!(item(None, Some("about")).href(), "/pages/about");
        assert_eq!(item(None, None).href(), "#");
    }

    #[test]
    fn input_validation() {
        let input = MenuItemInput {
            label: " Blog ".into(),
            url: Some("/".into()),
            page_id: None,
        };
        let (label, target) = input.validate().unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(label, "Blog");
        assert_eq!(target, MenuTarget::Url("/".into()));

        let missing_label = MenuItemInput {
            label: String::new(),
            url: Some("/".into()),
            page_id: None,
        };
        assert!(missing_label.validate().is_err());
    }
}
