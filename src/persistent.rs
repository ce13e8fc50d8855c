use crate::{cars::Car, config::Config, error::ScrapeError};
use futures::TryStreamExt;
use sqlx::{postgres::PgPoolOptions, PgPool, Row};
use std::time::Duration;
use tracing::{debug, warn};

const MAX_CONNECT_ATTEMPTS: u32 = 5;
const CONNECT_RETRY_DELAY: Duration = Duration::from_secs(5);

/// What `replace_all` did with the batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotOutcome {
    /// Empty batch: the existing snapshot was left untouched.
    Skipped,
    /// The table now holds exactly these rows.
    Replaced(usize),
}

pub struct Persistent {
    pool: PgPool,
}

impl Persistent {
    /// Connects to PostgreSQL, retrying a bounded number of times so the
    /// scraper survives the database still starting up, then ensures the
    /// cars table exists. Exhausting the retries is fatal for the run.
    pub async fn connect(config: &Config) -> Result<Persistent, ScrapeError> {
        let url = config.database_url();

        let mut attempt = 1;
        let pool = loop {
            match PgPoolOptions::new().connect(&url).await {
                Ok(pool) => break pool,
                Err(e) => {
                    if attempt == MAX_CONNECT_ATTEMPTS {
                        return Err(e.into());
                    }
                    warn!(
                        "Database connection attempt {}/{} failed: {}. Retrying in {:?}",
                        attempt, MAX_CONNECT_ATTEMPTS, e, CONNECT_RETRY_DELAY
                    );
                    tokio::time::sleep(CONNECT_RETRY_DELAY).await;
                    attempt += 1;
                }
            }
        };

        let p = Persistent { pool };
        p.create_table().await?;
        Ok(p)
    }

    async fn create_table(&self) -> Result<(), ScrapeError> {
        // class_letter is variable-width: class identifiers are not always
        // a single character.
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS cars (
                id SERIAL PRIMARY KEY,
                name VARCHAR(255) NOT NULL,
                year INTEGER,
                image_url TEXT,
                price INTEGER,
                rarity VARCHAR(50),
                speed FLOAT,
                handling FLOAT,
                acceleration FLOAT,
                launch FLOAT,
                braking FLOAT,
                class_letter VARCHAR(5),
                class_number INTEGER,
                source VARCHAR(100)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;
        debug!("Table cars created or already exists");
        Ok(())
    }

    /// Replaces the whole snapshot in one transaction: clear, then bulk
    /// insert. A reader never observes a partially replaced table, and a
    /// failed write rolls back to the previous snapshot. An empty batch is
    /// a no-op so a broken extraction cannot wipe good data.
    pub async fn replace_all(&self, cars: &[Car]) -> Result<SnapshotOutcome, ScrapeError> {
        if cars.is_empty() {
            return Ok(SnapshotOutcome::Skipped);
        }

        let mut tx = self.pool.begin().await?;
        sqlx::query("TRUNCATE cars RESTART IDENTITY")
            .execute(&mut tx)
            .await?;
        for car in cars {
            sqlx::query(
                r#"
                INSERT INTO cars (
                    name, year, image_url, price, rarity,
                    speed, handling, acceleration, launch, braking,
                    class_letter, class_number, source
                ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
                "#,
            )
            .bind(car.name.as_str())
            .bind(car.year)
            .bind(car.image_url.as_deref())
            .bind(car.price)
            .bind(car.rarity.as_str())
            .bind(car.speed)
            .bind(car.handling)
            .bind(car.acceleration)
            .bind(car.launch)
            .bind(car.braking)
            .bind(car.class_letter.as_deref())
            .bind(car.class_number)
            .bind(car.source.as_str())
            .execute(&mut tx)
            .await?;
        }
        tx.commit().await?;

        Ok(SnapshotOutcome::Replaced(cars.len()))
    }

    /// Reads the persisted snapshot back, in insertion order.
    pub async fn all(&self) -> Result<Vec<Car>, ScrapeError> {
        let mut cars = vec![];
        let mut rows = sqlx::query(
            r#"
            SELECT name, year, image_url, price, rarity,
                   speed, handling, acceleration, launch, braking,
                   class_letter, class_number, source
            FROM cars ORDER BY id
            "#,
        )
        .fetch(&self.pool);

        while let Some(row) = rows.try_next().await? {
            cars.push(Car {
                name: row.try_get("name")?,
                year: row.try_get("year")?,
                image_url: row.try_get("image_url")?,
                price: row.try_get("price")?,
                rarity: row.try_get("rarity")?,
                speed: row.try_get("speed")?,
                handling: row.try_get("handling")?,
                acceleration: row.try_get("acceleration")?,
                launch: row.try_get("launch")?,
                braking: row.try_get("braking")?,
                class_letter: row.try_get("class_letter")?,
                class_number: row.try_get("class_number")?,
                source: row.try_get("source")?,
            });
        }

        Ok(cars)
    }

    pub async fn count(&self) -> Result<i64, ScrapeError> {
        Ok(sqlx::query("SELECT COUNT(*) FROM cars")
            .fetch_one(&self.pool)
            .await?
            .try_get(0)?)
    }

    /// Releases the pool. Called on every exit path.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn car(name: &str, price: i32) -> Car {
        Car {
            name: name.to_string(),
            year: Some(2017),
            image_url: None,
            price,
            rarity: "Common".to_string(),
            speed: 120.0,
            handling: 5.0,
            acceleration: 5.5,
            launch: 4.5,
            braking: 5.0,
            class_letter: Some("B".to_string()),
            class_number: Some(700),
            source: "Autoshow".to_string(),
        }
    }

    #[tokio::test]
    #[ignore = "needs a running PostgreSQL reachable via the POSTGRES_* env vars"]
    async fn replace_discards_the_previous_snapshot() {
        let p = Persistent::connect(&Config::from_env()).await.unwrap();

        p.replace_all(&[car("Old A", 1000), car("Old B", 2000)])
            .await
            .unwrap();
        let outcome = p.replace_all(&[car("New", 3000)]).await.unwrap();

        assert_eq!(outcome, SnapshotOutcome::Replaced(1));
        assert_eq!(p.all().await.unwrap(), vec![car("New", 3000)]);
        p.close().await;
    }

    #[tokio::test]
    #[ignore = "needs a running PostgreSQL reachable via the POSTGRES_* env vars"]
    async fn empty_batch_keeps_the_previous_snapshot() {
        let p = Persistent::connect(&Config::from_env()).await.unwrap();

        p.replace_all(&[car("Survivor", 500)]).await.unwrap();
        let outcome = p.replace_all(&[]).await.unwrap();

        assert_eq!(outcome, SnapshotOutcome::Skipped);
        assert_eq!(p.all().await.unwrap(), vec![car("Survivor", 500)]);
        p.close().await;
    }

    #[tokio::test]
    #[ignore = "needs a running PostgreSQL reachable via the POSTGRES_* env vars"]
    async fn duplicate_names_are_preserved() {
        let p = Persistent::connect(&Config::from_env()).await.unwrap();

        p.replace_all(&[car("Twin", 100), car("Twin", 100)])
            .await
            .unwrap();

        assert_eq!(p.count().await.unwrap(), 2);
        p.close().await;
    }
}
