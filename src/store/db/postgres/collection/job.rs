use sea_query::{ColumnDef, ColumnType, Expr as SeaExpr, Iden, Index, Order as SeaOrder, PostgresQueryBuilder, Query as SeaQuery, SimpleExpr, Table};
use sea_query_binder::SqlxBinder;
use sqlx::{Error as DbError, Row, postgres::PgRow};

use crate::{
    Result,
    store::{
        DbCollection, SaveMode, data,
        db::postgres::{DbInit, DbRow},
    },
};

use super::{DbConnection, map_db_err};

pub struct JobCollection {
    conn: DbConnection,
}

#[derive(Iden)]
#[iden = "jobs"]
enum CollectionIden {
    Table,

    Jobid,
    Jsversion,
    State,
    Substate,
    Svrflags,
    Priority,
    Rank,
    Stime,
    Endtime,
    Queue,
    Destin,
    Fileprefix,
    ResvId,
    Extend,
    Tracking,
    Attributes,
}

const COLUMNS: [CollectionIden; 16] = [
    CollectionIden::Jobid,
    CollectionIden::Jsversion,
    CollectionIden::State,
    CollectionIden::Substate,
    CollectionIden::Svrflags,
    CollectionIden::Priority,
    CollectionIden::Rank,
    CollectionIden::Stime,
    CollectionIden::Endtime,
    CollectionIden::Queue,
    CollectionIden::Destin,
    CollectionIden::Fileprefix,
    CollectionIden::ResvId,
    CollectionIden::Extend,
    CollectionIden::Tracking,
    CollectionIden::Attributes,
];

impl DbCollection for JobCollection {
    type Item = data::DbJob;

    fn find(
        &self,
        id: &str,
    ) -> Result<Option<Self::Item>> {
        let (sql, values) =
            SeaQuery::select().from(CollectionIden::Table).columns(COLUMNS).and_where(SeaExpr::col(CollectionIden::Jobid).eq(id)).build_sqlx(PostgresQueryBuilder);

        match self.conn.query_one(&sql, values).map_err(map_db_err)? {
            Some(row) => Ok(Some(Self::Item::from_row(&row).map_err(map_db_err)?)),
            None => Ok(None),
        }
    }

    fn ids(&self) -> Result<Vec<String>> {
        let (sql, values) = SeaQuery::select()
            .from(CollectionIden::Table)
            .column(CollectionIden::Jobid)
            .order_by(CollectionIden::Jobid, SeaOrder::Asc)
            .build_sqlx(PostgresQueryBuilder);

        let rows = self.conn.query(&sql, values).map_err(map_db_err)?;
        rows.iter().map(|row| row.try_get::<String, _>("jobid").map_err(map_db_err)).collect()
    }

    fn save(
        &self,
        data: &Self::Item,
        mode: SaveMode,
    ) -> Result<bool> {
        let model = data.clone();
        let (sql, sql_values) = match mode {
            SaveMode::InsertNew => SeaQuery::insert()
                .into_table(CollectionIden::Table)
                .columns(COLUMNS)
                .values([
                    model.jobid.into(),
                    model.jsversion.into(),
                    model.state.into(),
                    model.substate.into(),
                    model.svrflags.into(),
                    model.priority.into(),
                    model.rank.into(),
                    model.stime.into(),
                    model.endtime.into(),
                    model.queue.into(),
                    model.destin.into(),
                    model.fileprefix.into(),
                    model.resv_id.into(),
                    model.extend.into(),
                    model.tracking.into(),
                    model.attributes.into(),
                ])
                .map_err(map_db_err)?
                .build_sqlx(PostgresQueryBuilder),
            SaveMode::UpdateFull | SaveMode::UpdateQuick => {
                let mut values: Vec<(CollectionIden, SimpleExpr)> = vec![
                    (CollectionIden::Jsversion, model.jsversion.into()),
                    (CollectionIden::State, model.state.into()),
                    (CollectionIden::Substate, model.substate.into()),
                    (CollectionIden::Svrflags, model.svrflags.into()),
                    (CollectionIden::Priority, model.priority.into()),
                    (CollectionIden::Rank, model.rank.into()),
                    (CollectionIden::Stime, model.stime.into()),
                    (CollectionIden::Endtime, model.endtime.into()),
                    (CollectionIden::Queue, model.queue.into()),
                    (CollectionIden::Destin, model.destin.into()),
                    (CollectionIden::Fileprefix, model.fileprefix.into()),
                    (CollectionIden::ResvId, model.resv_id.into()),
                    (CollectionIden::Extend, model.extend.into()),
                ];
                if mode == SaveMode::UpdateFull {
                    values.push((CollectionIden::Tracking, model.tracking.into()));
                    values.push((CollectionIden::Attributes, model.attributes.into()));
                }
                SeaQuery::update()
                    .table(CollectionIden::Table)
                    .values(values)
                    .and_where(SeaExpr::col(CollectionIden::Jobid).eq(data.jobid.as_str()))
                    .build_sqlx(PostgresQueryBuilder)
            }
        };

        let result = self.conn.execute(sql.as_str(), sql_values).map_err(map_db_err)?;
        Ok(result.rows_affected() > 0)
    }

    fn delete(
        &self,
        id: &str,
    ) -> Result<bool> {
        let (sql, values) =
            SeaQuery::delete().from_table(CollectionIden::Table).and_where(SeaExpr::col(CollectionIden::Jobid).eq(id)).build_sqlx(PostgresQueryBuilder);

        let result = self.conn.execute(sql.as_str(), values).map_err(map_db_err)?;
        Ok(result.rows_affected() > 0)
    }
}

impl DbRow for data::DbJob {
    fn from_row(row: &PgRow) -> std::result::Result<Self, DbError>
    where
        Self: Sized,
    {
        Ok(Self {
            jobid: row.try_get("jobid")?,
            jsversion: row.try_get("jsversion")?,
            state: row.try_get("state")?,
            substate: row.try_get("substate")?,
            svrflags: row.try_get("svrflags")?,
            priority: row.try_get("priority")?,
            rank: row.try_get("rank")?,
            stime: row.try_get("stime")?,
            endtime: row.try_get("endtime")?,
            queue: row.try_get("queue")?,
            destin: row.try_get("destin")?,
            fileprefix: row.try_get("fileprefix")?,
            resv_id: row.try_get("resv_id")?,
            extend: row.try_get("extend")?,
            tracking: row.try_get("tracking")?,
            attributes: row.try_get("attributes")?,
        })
    }
}

impl DbInit for JobCollection {
    fn init(&self) -> Result<()> {
        let sql = [
            Table::create()
                .table(CollectionIden::Table)
                .if_not_exists()
                .col(ColumnDef::new(CollectionIden::Jobid).string().not_null().primary_key())
                .col(ColumnDef::new(CollectionIden::Jsversion).integer().not_null())
                .col(ColumnDef::new(CollectionIden::State).integer().not_null().default(0))
                .col(ColumnDef::new(CollectionIden::Substate).integer().not_null().default(0))
                .col(ColumnDef::new(CollectionIden::Svrflags).integer().not_null().default(0))
                .col(ColumnDef::new(CollectionIden::Priority).integer().not_null().default(0))
                .col(ColumnDef::new(CollectionIden::Rank).integer().not_null().default(0))
                .col(ColumnDef::new(CollectionIden::Stime).big_integer().not_null().default(0))
                .col(ColumnDef::new(CollectionIden::Endtime).big_integer().not_null().default(0))
                .col(ColumnDef::new(CollectionIden::Queue).string().not_null().default(""))
                .col(ColumnDef::new(CollectionIden::Destin).string().not_null().default(""))
                .col(ColumnDef::new(CollectionIden::Fileprefix).string().not_null().default(""))
                .col(ColumnDef::new(CollectionIden::ResvId).string())
                .col(ColumnDef::new(CollectionIden::Extend).binary().not_null())
                .col(ColumnDef::new(CollectionIden::Tracking).binary())
                .col(ColumnDef::new(CollectionIden::Attributes).array(ColumnType::Text).not_null())
                .build(PostgresQueryBuilder),
            Index::create().name("idx_jobs_resv_id").if_not_exists().table(CollectionIden::Table).col(CollectionIden::ResvId).build(PostgresQueryBuilder),
        ];

        self.conn.batch_execute(&sql).map_err(map_db_err)
    }
}

impl JobCollection {
    pub fn new(conn: &DbConnection) -> Self {
        Self {
            conn: conn.clone(),
        }
    }
}
