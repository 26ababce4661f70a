mod devices;
mod helper;
mod invalid_json;
mod reminders;
mod root;
mod users;
