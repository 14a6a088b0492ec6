use time::OffsetDateTime;
use uuid::Uuid;

use crate::{Result, db::Db};

pub async fn insert_notification(
	db: &Db,
	user_id: &str,
	title: &str,
	content: &str,
	kind: &str,
) -> Result<Uuid> {
	let id = Uuid::new_v4();
	let now = OffsetDateTime::now_utc();

	sqlx::query(
		"\
INSERT INTO notifications (id, user_id, title, content, kind, created_at)
VALUES ($1, $2, $3, $4, $5, $6)",
	)
	.bind(id)
	.bind(user_id)
	.bind(title)
	.bind(content)
	.bind(kind)
	.bind(now)
	.execute(&db.pool)
	.await?;

	Ok(id)
}
