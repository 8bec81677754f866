pub mod comments;
pub mod course_professors;
pub mod courses;
pub mod likes;
pub mod professors;
pub mod reports;
pub mod reviews;
pub mod users;
