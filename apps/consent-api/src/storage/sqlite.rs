//! SQLite submission index

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use sqlx::FromRow;
use uuid::Uuid;

use consent_core::{AuthorizationMode, CommittedSubmission, IndexError, SubmissionIndex};

/// Index of committed submissions in the `consent_submissions` table
///
/// `medical_record_number` is indexed but not unique; one patient may hold
/// several consents.
#[derive(Debug, Clone)]
pub struct SqliteIndex {
    pool: SqlitePool,
}

impl SqliteIndex {
    pub async fn connect(database_url: &str) -> Result<Self, sqlx::Error> {
        // Each connection to an in-memory database sees its own database
        let max_connections = if database_url.contains(":memory:") { 1 } else { 5 };

        tracing::info!("Connecting to submission index: {}", database_url);
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        let index = Self { pool };
        index.run_migrations().await?;
        Ok(index)
    }

    async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        tracing::info!("Running index migrations...");

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS consent_submissions (
                id TEXT PRIMARY KEY,
                first_name TEXT NOT NULL,
                last_name TEXT NOT NULL,
                date_of_birth TEXT NOT NULL,
                medical_record_number TEXT NOT NULL,
                email TEXT NOT NULL,
                phone TEXT NOT NULL,
                address TEXT NOT NULL,
                city TEXT NOT NULL,
                state TEXT NOT NULL,
                zip_code TEXT NOT NULL,
                authorized_person TEXT,
                authorization_mode TEXT NOT NULL,
                signature_date TEXT,
                verbal_auth_date TEXT,
                employee_first_name TEXT NOT NULL,
                employee_last_name TEXT NOT NULL,
                employee_email TEXT NOT NULL,
                employee_department TEXT NOT NULL,
                case_topic TEXT NOT NULL,
                submitted_at TEXT,
                artifact_storage_path TEXT NOT NULL,
                artifact_sha256 TEXT NOT NULL,
                created_at TEXT NOT NULL DEFAULT (datetime('now'))
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_consent_submissions_mrn
            ON consent_submissions(medical_record_number)
            "#,
        )
        .execute(&self.pool)
        .await?;

        tracing::info!("Index migrations complete");
        Ok(())
    }
}

#[derive(Debug, FromRow)]
struct SubmissionRow {
    id: String,
    first_name: String,
    last_name: String,
    date_of_birth: String,
    medical_record_number: String,
    email: String,
    phone: String,
    address: String,
    city: String,
    state: String,
    zip_code: String,
    authorized_person: Option<String>,
    authorization_mode: String,
    signature_date: Option<String>,
    verbal_auth_date: Option<String>,
    employee_first_name: String,
    employee_last_name: String,
    employee_email: String,
    employee_department: String,
    case_topic: String,
    submitted_at: Option<String>,
    artifact_storage_path: String,
    artifact_sha256: String,
}

impl TryFrom<SubmissionRow> for CommittedSubmission {
    type Error = IndexError;

    fn try_from(row: SubmissionRow) -> Result<Self, Self::Error> {
        let id = Uuid::parse_str(&row.id)
            .map_err(|e| IndexError::CorruptRow(format!("id {}: {}", row.id, e)))?;
        let authorization_mode = AuthorizationMode::parse(&row.authorization_mode)
            .ok_or_else(|| {
                IndexError::CorruptRow(format!(
                    "authorization_mode {}",
                    row.authorization_mode
                ))
            })?;
        let submitted_at = row
            .submitted_at
            .as_deref()
            .map(DateTime::parse_from_rfc3339)
            .transpose()
            .map_err(|e| IndexError::CorruptRow(format!("submitted_at: {}", e)))?
            .map(|t| t.with_timezone(&Utc));

        Ok(CommittedSubmission {
            id,
            first_name: row.first_name,
            last_name: row.last_name,
            date_of_birth: row.date_of_birth,
            medical_record_number: row.medical_record_number,
            email: row.email,
            phone: row.phone,
            address: row.address,
            city: row.city,
            state: row.state,
            zip_code: row.zip_code,
            authorized_person: row.authorized_person,
            authorization_mode,
            signature_date: row.signature_date,
            verbal_auth_date: row.verbal_auth_date,
            employee_first_name: row.employee_first_name,
            employee_last_name: row.employee_last_name,
            employee_email: row.employee_email,
            employee_department: row.employee_department,
            case_topic: row.case_topic,
            submitted_at,
            artifact_storage_path: row.artifact_storage_path,
            artifact_sha256: row.artifact_sha256,
        })
    }
}

fn database_error(e: sqlx::Error) -> IndexError {
    IndexError::Database(e.to_string())
}

#[async_trait]
impl SubmissionIndex for SqliteIndex {
    async fn find_by_mrn(&self, mrn: &str) -> Result<Vec<CommittedSubmission>, IndexError> {
        let rows = sqlx::query_as::<_, SubmissionRow>(
            r#"
            SELECT id, first_name, last_name, date_of_birth, medical_record_number,
                   email, phone, address, city, state, zip_code, authorized_person,
                   authorization_mode, signature_date, verbal_auth_date,
                   employee_first_name, employee_last_name, employee_email,
                   employee_department, case_topic, submitted_at,
                   artifact_storage_path, artifact_sha256
            FROM consent_submissions
            WHERE medical_record_number = ?
            "#,
        )
        .bind(mrn)
        .fetch_all(&self.pool)
        .await
        .map_err(database_error)?;

        rows.into_iter().map(CommittedSubmission::try_from).collect()
    }

    async fn insert(&self, row: &CommittedSubmission) -> Result<(), IndexError> {
        sqlx::query(
            r#"
            INSERT INTO consent_submissions (
                id, first_name, last_name, date_of_birth, medical_record_number,
                email, phone, address, city, state, zip_code, authorized_person,
                authorization_mode, signature_date, verbal_auth_date,
                employee_first_name, employee_last_name, employee_email,
                employee_department, case_topic, submitted_at,
                artifact_storage_path, artifact_sha256
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(row.id.to_string())
        .bind(&row.first_name)
        .bind(&row.last_name)
        .bind(&row.date_of_birth)
        .bind(&row.medical_record_number)
        .bind(&row.email)
        .bind(&row.phone)
        .bind(&row.address)
        .bind(&row.city)
        .bind(&row.state)
        .bind(&row.zip_code)
        .bind(&row.authorized_person)
        .bind(row.authorization_mode.as_str())
        .bind(&row.signature_date)
        .bind(&row.verbal_auth_date)
        .bind(&row.employee_first_name)
        .bind(&row.employee_last_name)
        .bind(&row.employee_email)
        .bind(&row.employee_department)
        .bind(&row.case_topic)
        .bind(row.submitted_at.map(|t| t.to_rfc3339()))
        .bind(&row.artifact_storage_path)
        .bind(&row.artifact_sha256)
        .execute(&self.pool)
        .await
        .map_err(database_error)?;

        tracing::debug!(id = %row.id, "Indexed submission");
        Ok(())
    }
}
