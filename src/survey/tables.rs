// Typing of the raw tables into survey entities.

use crate::survey::io_common::{parse_id, parse_question_id, parse_year, RawRow, RawTable};
use crate::survey::*;

use dialect_survey::builder::Builder;

fn skip(table: &RawTable, row: &RawRow, column: &str) {
    warn!(
        "{}: line {}: invalid or missing {}, skipping the row",
        table.name, row.lineno, column
    );
}

fn text(row: &RawRow, column: Option<usize>) -> Option<String> {
    row.get(column).map(|s| s.to_string())
}

fn add_users(table: &RawTable, builder: &mut Builder) -> SurveyResult<usize> {
    let id_c = table.column("id")?;
    let year_c = table.optional_column("year");
    let gender_c = table.optional_column("gender");
    let state_c = table.optional_column("state");
    let language_c = table.optional_column("language");
    let mut count: usize = 0;
    for row in table.rows.iter() {
        let id = match row.get(Some(id_c)).and_then(parse_id) {
            Some(x) => x,
            None => {
                skip(table, row, "id");
                continue;
            }
        };
        let birth_year = row.get(year_c).and_then(parse_year);
        if birth_year.is_none() && row.get(year_c).is_some() {
            debug!("users: line {}: unreadable birth year", row.lineno);
        }
        builder.add_user(User {
            id,
            birth_year,
            gender: text(row, gender_c),
            state: text(row, state_c),
            language: text(row, language_c),
        });
        count += 1;
    }
    Ok(count)
}

fn add_questions(table: &RawTable, builder: &mut Builder) -> SurveyResult<usize> {
    let id_c = table.column("id")?;
    let text_c = table.optional_column("text");
    let mut count: usize = 0;
    for row in table.rows.iter() {
        let id = match row.get(Some(id_c)).and_then(parse_question_id) {
            Some(x) => x,
            None => {
                skip(table, row, "id");
                continue;
            }
        };
        builder.add_question(Question {
            id,
            text: text(row, text_c).unwrap_or_default(),
            choices: Vec::new(),
        });
        count += 1;
    }
    Ok(count)
}

fn add_choices(table: &RawTable, builder: &mut Builder) -> SurveyResult<usize> {
    let id_c = table.column("id")?;
    let question_c = table.column("question_id")?;
    let value_c = table.column("value")?;
    let mut count: usize = 0;
    for row in table.rows.iter() {
        let (id, question_id) = match (
            row.get(Some(id_c)).and_then(parse_id),
            row.get(Some(question_c)).and_then(parse_question_id),
        ) {
            (Some(id), Some(q)) => (id, q),
            _ => {
                skip(table, row, "id or question_id");
                continue;
            }
        };
        builder.add_choice(Choice {
            id,
            question_id,
            value: text(row, Some(value_c)).unwrap_or_default(),
        });
        count += 1;
    }
    Ok(count)
}

fn add_responses(table: &RawTable, builder: &mut Builder) -> SurveyResult<usize> {
    let id_c = table.column("id")?;
    let user_c = table.column("user_id")?;
    let question_c = table.column("question_id")?;
    let choice_c = table.optional_column("choice_id");
    let other_c = table.optional_column("other");
    let mut count: usize = 0;
    for row in table.rows.iter() {
        let (id, user_id, question_id) = match (
            row.get(Some(id_c)).and_then(parse_id),
            row.get(Some(user_c)).and_then(parse_id),
            row.get(Some(question_c)).and_then(parse_question_id),
        ) {
            (Some(id), Some(u), Some(q)) => (id, u, q),
            _ => {
                skip(table, row, "id, user_id or question_id");
                continue;
            }
        };
        builder.add_response(Response {
            id,
            user_id,
            question_id,
            choice_id: row.get(choice_c).and_then(parse_id),
            other: text(row, other_c),
        });
        count += 1;
    }
    Ok(count)
}

/// Adds the rows of a raw table to the builder, dispatching on the table name.
pub fn add_table(table: &RawTable, builder: &mut Builder) -> SurveyResult<usize> {
    let count = match table.name.as_str() {
        "users" => add_users(table, builder)?,
        "questions" => add_questions(table, builder)?,
        "choices" => add_choices(table, builder)?,
        "responses" => add_responses(table, builder)?,
        x => whatever!("Unknown table {:?}", x),
    };
    let skipped = table.rows.len() - count;
    if skipped > 0 {
        warn!("{}: skipped {} rows out of {}", table.name, skipped, table.rows.len());
    }
    info!("{}: loaded {} rows", table.name, count);
    Ok(count)
}
