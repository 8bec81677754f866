//! Demo accounts and catalog entries for a fresh database.

use crate::auth::hash_password;
use crate::orm::users::{self, Role};
use crate::orm::{course_professors, courses, professors};
use chrono::Utc;
use sea_orm::sea_query::OnConflict;
use sea_orm::{entity::*, query::*, ColumnTrait, DatabaseConnection, DbErr, EntityTrait};

pub const DEMO_PASSWORD: &str = "password123";

/// (email, first name, last name, role)
pub const DEMO_USERS: [(&str, &str, &str, Role); 3] = [
    ("student@ada.edu.az", "Test", "Student", Role::Student),
    ("professor@ada.edu.az", "Test", "Professor", Role::Professor),
    ("admin@ada.edu.az", "Test", "Admin", Role::Admin),
];

/// Insert the demo users, a sample course and a sample professor teaching
/// it. Rows that already exist are left untouched. Returns the demo users.
pub async fn seed(db: &DatabaseConnection) -> Result<Vec<users::Model>, DbErr> {
    let hash = hash_password(DEMO_PASSWORD)
        .map_err(|e| DbErr::Custom(format!("Unable to hash demo password: {}", e)))?;
    let now = Utc::now().naive_utc();

    for (email, first_name, last_name, role) in DEMO_USERS {
        users::Entity::insert(users::ActiveModel {
            email: Set(email.to_owned()),
            password_hash: Set(hash.clone()),
            first_name: Set(first_name.to_owned()),
            last_name: Set(last_name.to_owned()),
            role: Set(role),
            is_active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        })
        .on_conflict(
            OnConflict::column(users::Column::Email)
                .do_nothing()
                .to_owned(),
        )
        .exec_without_returning(db)
        .await?;
    }

    courses::Entity::insert(courses::ActiveModel {
        code: Set("CS101".to_owned()),
        name: Set("Introduction to Computer Science".to_owned()),
        description: Set(Some(
            "Programming fundamentals, algorithms and problem solving.".to_owned(),
        )),
        department: Set("Computer Science".to_owned()),
        credits: Set(6),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    })
    .on_conflict(
        OnConflict::column(courses::Column::Code)
            .do_nothing()
            .to_owned(),
    )
    .exec_without_returning(db)
    .await?;

    let course = courses::Entity::find()
        .filter(courses::Column::Code.eq("CS101"))
        .one(db)
        .await?
        .ok_or_else(|| DbErr::RecordNotFound("CS101".to_owned()))?;

    let professor = match professors::Entity::find()
        .filter(professors::Column::Email.eq("jane.doe@ada.edu.az"))
        .one(db)
        .await?
    {
        Some(professor) => professor,
        None => {
            professors::ActiveModel {
                first_name: Set("Jane".to_owned()),
                last_name: Set("Doe".to_owned()),
                email: Set(Some("jane.doe@ada.edu.az".to_owned())),
                department: Set("Computer Science".to_owned()),
                bio: Set(Some("Teaches introductory programming.".to_owned())),
                created_at: Set(now),
                updated_at: Set(now),
                ..Default::default()
            }
            .insert(db)
            .await?
        }
    };

    course_professors::Entity::insert(course_professors::ActiveModel {
        course_id: Set(course.id),
        professor_id: Set(professor.id),
        created_at: Set(now),
    })
    .on_conflict(
        OnConflict::columns([
            course_professors::Column::CourseId,
            course_professors::Column::ProfessorId,
        ])
        .do_nothing()
        .to_owned(),
    )
    .exec_without_returning(db)
    .await?;

    let emails: Vec<&str> = DEMO_USERS.iter().map(|(email, ..)| *email).collect();
    users::Entity::find()
        .filter(users::Column::Email.is_in(emails))
        .order_by_asc(users::Column::Id)
        .all(db)
        .await
}
