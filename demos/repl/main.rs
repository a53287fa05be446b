//! An interactive shell over a handful of heaps. Allocations are named, and
//! the names keep working across `defrag`, which is the point.

use std::collections::{hash_map::Entry, HashMap};

use clap::Parser;
use linefeed::{Interface, ReadResult};
use relocheap::{Error, Handle, Heap, StdAllocator};

use crate::parsing::Command;

mod parsing;

struct Session {
    heap: Heap<'static, 'static, StdAllocator>,
    handles: HashMap<String, Handle>,
}

fn report(error: Error) {
    match error {
        Error::OutOfMemory => println!("No free block is large enough. Try defrag?"),
        Error::OutOfHandles => println!("Too many live allocations!"),
        Error::NoSuchAllocation => println!("That allocation was already freed!"),
        Error::BufferOverflow => println!("The data must be non-empty and fit the allocation!"),
        Error::AllocZeroSize => println!("The size must not be zero!"),
        Error::AllocatorError => println!("Could not allocate bookkeeping: {error}"),
    }
}

fn main() -> anyhow::Result<()> {
    let interface = Interface::new("relocheap-test")?;
    interface.set_prompt("[∴] ")?;

    let mut sessions: HashMap<String, Session> = HashMap::new();

    while let ReadResult::Input(command) = interface.read_line()? {
        match Command::try_parse_from(["[∴]"].into_iter().chain(command.split(' '))) {
            Ok(Command::Exit) => break,
            Ok(Command::Create { name, size }) => match sessions.entry(name.clone()) {
                Entry::Vacant(entry) => {
                    let memory = Box::leak(vec![0u8; size].into_boxed_slice());
                    match Heap::<_>::create(name.leak(), memory, StdAllocator) {
                        Ok(heap) => {
                            println!(
                                "Created heap {:?} of {size:#x} bytes at {:#x}",
                                heap.label(),
                                heap.base()
                            );
                            entry.insert(Session {
                                heap,
                                handles: HashMap::new(),
                            });
                        }
                        Err(e) => report(e),
                    }
                }
                Entry::Occupied(_) => {
                    println!("There is already a heap named {name:?}");
                }
            },
            Ok(Command::Delete { heap }) => {
                match sessions.remove(&heap) {
                    Some(_) => println!("Deleted heap {heap:?}!"),
                    None => println!("There is no heap named {heap:?} :("),
                };
            }
            Ok(Command::Print { heap: None }) => {
                if !sessions.is_empty() {
                    println!();
                    for session in sessions.values() {
                        println!("{:?}", session.heap);
                    }
                } else {
                    println!("There are no heaps to print!");
                }
            }
            Ok(Command::Print { heap: Some(heap) }) => {
                match sessions.get(&heap) {
                    Some(session) => {
                        println!("\n{:?}", session.heap);
                        for (name, handle) in &session.handles {
                            println!("  {name} = {handle}");
                        }
                    }
                    None => println!("There is no heap named {heap:?} :("),
                };
            }
            Ok(Command::Defrag { heap }) => {
                match sessions.get_mut(&heap) {
                    Some(session) => match session.heap.defrag() {
                        Ok(()) => println!("Defragmented, {:#x} bytes free", session.heap.free_space()),
                        Err(e) => report(e),
                    },
                    None => println!("There is no heap named {heap:?} :("),
                };
            }
            Ok(Command::Alloc { heap, name, size }) => {
                let Some(session) = sessions.get_mut(&heap) else {
                    println!("There is no heap named {heap:?} :(");
                    continue;
                };
                if session.handles.contains_key(&name) {
                    println!("There is already an allocation named {name:?}");
                    continue;
                }
                match session.heap.alloc(size) {
                    Ok(handle) => {
                        println!(
                            "Allocated {size:#x} bytes at {:#x} as {name} ({handle})",
                            session.heap.get(handle).unwrap_or_default()
                        );
                        session.handles.insert(name, handle);
                    }
                    Err(e) => report(e),
                }
            }
            Ok(Command::Free { heap, name }) => {
                let Some(session) = sessions.get_mut(&heap) else {
                    println!("There is no heap named {heap:?} :(");
                    continue;
                };
                match session.handles.remove(&name) {
                    Some(handle) => match session.heap.free(handle) {
                        Ok(()) => println!("Freed {name}"),
                        Err(e) => report(e),
                    },
                    None => println!("There is no allocation named {name:?}"),
                }
            }
            Ok(Command::Realloc { heap, name, size }) => {
                let Some(session) = sessions.get_mut(&heap) else {
                    println!("There is no heap named {heap:?} :(");
                    continue;
                };
                let Some(handle) = session.handles.get_mut(&name) else {
                    println!("There is no allocation named {name:?}");
                    continue;
                };
                match session.heap.realloc(handle, size) {
                    Ok(()) => println!(
                        "Reallocated {name} to {size:#x} bytes at {:#x}, contents discarded",
                        session.heap.get(*handle).unwrap_or_default()
                    ),
                    Err(e) => report(e),
                }
            }
            Ok(Command::Set { heap, name, data }) => {
                let Some(session) = sessions.get_mut(&heap) else {
                    println!("There is no heap named {heap:?} :(");
                    continue;
                };
                let Some(handle) = session.handles.get(&name) else {
                    println!("There is no allocation named {name:?}");
                    continue;
                };
                match session.heap.set(*handle, data.as_bytes()) {
                    Ok(()) => println!("Wrote {:#x} bytes to {name}", data.len()),
                    Err(e) => report(e),
                }
            }
            Ok(Command::Get { heap, name }) => {
                let Some(session) = sessions.get(&heap) else {
                    println!("There is no heap named {heap:?} :(");
                    continue;
                };
                let Some(handle) = session.handles.get(&name) else {
                    println!("There is no allocation named {name:?}");
                    continue;
                };
                match (session.heap.get(*handle), session.heap.bytes(*handle)) {
                    (Some(address), Some(bytes)) => {
                        println!("{name} at {address:#x}: {:?}", String::from_utf8_lossy(bytes))
                    }
                    _ => println!("{name} no longer refers to anything"),
                }
            }
            Err(err) => {
                println!();
                err.print()?;
                println!();
                continue;
            }
        }
    }

    Ok(())
}
