//! `gatehouse routes`: print the built-in route table.

use crate::routes::RouteTable;

pub fn execute() {
    println!("{:<10} {:<20} {:<10}    UPSTREAM", "METHODS", "PATH", "ACCESS");
    for line in RouteTable::standard().describe() {
        println!("{line}");
    }
}
