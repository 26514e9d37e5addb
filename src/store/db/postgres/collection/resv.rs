use sea_query::{ColumnDef, ColumnType, Expr as SeaExpr, Iden, Order as SeaOrder, PostgresQueryBuilder, Query as SeaQuery, SimpleExpr, Table};
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

pub struct ResvCollection {
    conn: DbConnection,
}

#[derive(Iden)]
#[iden = "resvs"]
enum CollectionIden {
    Table,

    ResvId,
    Rsversion,
    State,
    Substate,
    Svrflags,
    Start,
    End,
    Duration,
    Tactive,
    Queue,
    Fileprefix,
    Attributes,
}

const COLUMNS: [CollectionIden; 12] = [
    CollectionIden::ResvId,
    CollectionIden::Rsversion,
    CollectionIden::State,
    CollectionIden::Substate,
    CollectionIden::Svrflags,
    CollectionIden::Start,
    CollectionIden::End,
    CollectionIden::Duration,
    CollectionIden::Tactive,
    CollectionIden::Queue,
    CollectionIden::Fileprefix,
    CollectionIden::Attributes,
];

impl DbCollection for ResvCollection {
    type Item = data::DbResv;

    fn find(
        &self,
        id: &str,
    ) -> Result<Option<Self::Item>> {
        let (sql, values) =
            SeaQuery::select().from(CollectionIden::Table).columns(COLUMNS).and_where(SeaExpr::col(CollectionIden::ResvId).eq(id)).build_sqlx(PostgresQueryBuilder);

        match self.conn.query_one(&sql, values).map_err(map_db_err)? {
            Some(row) => Ok(Some(Self::Item::from_row(&row).map_err(map_db_err)?)),
            None => Ok(None),
        }
    }

    fn ids(&self) -> Result<Vec<String>> {
        let (sql, values) = SeaQuery::select()
            .from(CollectionIden::Table)
            .column(CollectionIden::ResvId)
            .order_by(CollectionIden::ResvId, SeaOrder::Asc)
            .build_sqlx(PostgresQueryBuilder);

        let rows = self.conn.query(&sql, values).map_err(map_db_err)?;
        rows.iter().map(|row| row.try_get::<String, _>("resv_id").map_err(map_db_err)).collect()
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
                    model.resv_id.into(),
                    model.rsversion.into(),
                    model.state.into(),
                    model.substate.into(),
                    model.svrflags.into(),
                    model.start.into(),
                    model.end.into(),
                    model.duration.into(),
                    model.tactive.into(),
                    model.queue.into(),
                    model.fileprefix.into(),
                    model.attributes.into(),
                ])
                .map_err(map_db_err)?
                .build_sqlx(PostgresQueryBuilder),
            SaveMode::UpdateFull | SaveMode::UpdateQuick => {
                let mut values: Vec<(CollectionIden, SimpleExpr)> = vec![
                    (CollectionIden::Rsversion, model.rsversion.into()),
                    (CollectionIden::State, model.state.into()),
                    (CollectionIden::Substate, model.substate.into()),
                    (CollectionIden::Svrflags, model.svrflags.into()),
                    (CollectionIden::Start, model.start.into()),
                    (CollectionIden::End, model.end.into()),
                    (CollectionIden::Duration, model.duration.into()),
                    (CollectionIden::Tactive, model.tactive.into()),
                    (CollectionIden::Queue, model.queue.into()),
                    (CollectionIden::Fileprefix, model.fileprefix.into()),
                ];
                if mode == SaveMode::UpdateFull {
                    values.push((CollectionIden::Attributes, model.attributes.into()));
                }
                SeaQuery::update()
                    .table(CollectionIden::Table)
                    .values(values)
                    .and_where(SeaExpr::col(CollectionIden::ResvId).eq(data.resv_id.as_str()))
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
            SeaQuery::delete().from_table(CollectionIden::Table).and_where(SeaExpr::col(CollectionIden::ResvId).eq(id)).build_sqlx(PostgresQueryBuilder);

        let result = self.conn.execute(sql.as_str(), values).map_err(map_db_err)?;
        Ok(result.rows_affected() > 0)
    }
}

impl DbRow for data::DbResv {
    fn from_row(row: &PgRow) -> std::result::Result<Self, DbError>
    where
        Self: Sized,
    {
        Ok(Self {
            resv_id: row.try_get("resv_id")?,
            rsversion: row.try_get("rsversion")?,
            state: row.try_get("state")?,
            substate: row.try_get("substate")?,
            svrflags: row.try_get("svrflags")?,
            start: row.try_get("start")?,
            end: row.try_get("end")?,
            duration: row.try_get("duration")?,
            tactive: row.try_get("tactive")?,
            queue: row.try_get("queue")?,
            fileprefix: row.try_get("fileprefix")?,
            attributes: row.try_get("attributes")?,
        })
    }
}

impl DbInit for ResvCollection {
    fn init(&self) -> Result<()> {
        let sql = [Table::create()
            .table(CollectionIden::Table)
            .if_not_exists()
            .col(ColumnDef::new(CollectionIden::ResvId).string().not_null().primary_key())
            .col(ColumnDef::new(CollectionIden::Rsversion).integer().not_null())
            .col(ColumnDef::new(CollectionIden::State).integer().not_null().default(0))
            .col(ColumnDef::new(CollectionIden::Substate).integer().not_null().default(0))
            .col(ColumnDef::new(CollectionIden::Svrflags).integer().not_null().default(0))
            .col(ColumnDef::new(CollectionIden::Start).big_integer().not_null().default(0))
            .col(ColumnDef::new(CollectionIden::End).big_integer().not_null().default(0))
            .col(ColumnDef::new(CollectionIden::Duration).big_integer().not_null().default(0))
            .col(ColumnDef::new(CollectionIden::Tactive).big_integer().not_null().default(0))
            .col(ColumnDef::new(CollectionIden::Queue).string().not_null().default(""))
            .col(ColumnDef::new(CollectionIden::Fileprefix).string().not_null().default(""))
            .col(ColumnDef::new(CollectionIden::Attributes).array(ColumnType::Text).not_null())
            .build(PostgresQueryBuilder)];

        self.conn.batch_execute(&sql).map_err(map_db_err)
    }
}

impl ResvCollection {
    pub fn new(conn: &DbConnection) -> Self {
        Self {
            conn: conn.clone(),
        }
    }
}
