use std::{env, io, ptr};

use fitalloc::{Arena, Fit, Heap, HeapConfig, HeapGrower};

/// Prints every block of the heap in address order.
fn print_blocks<G: HeapGrower>(
  label: &str,
  heap: &Heap<G>,
) {
  println!("[{label}]");
  for (at, block) in heap.blocks() {
    println!(
      "  offset {:>5}  size {:>6}  {}",
      at.offset(),
      block.size,
      if block.is_free { "free" } else { "used" }
    );
  }
}

fn main() -> io::Result<()> {
  env_logger::init();

  // Strategy from the first argument: first, best, worst or next.
  let fit = match env::args().nth(1) {
    Some(name) => name.parse::<Fit>().unwrap_or_else(|err| {
      eprintln!("{err}");
      std::process::exit(2);
    }),
    None => Fit::default(),
  };

  let mut heap = Heap::with_config(Arena::new(1 << 20), HeapConfig::new(fit));
  println!("using {fit} fit");

  // --------------------------------------------------------------------
  // 1) Carve three holes of 20, 52 and 32 bytes, each pinned in place by a
  //    small live guard block so they cannot coalesce.
  // --------------------------------------------------------------------
  let mut holes = Vec::new();
  for size in [20, 52, 32] {
    holes.push(heap.allocate(size).expect("arena exhausted"));
    heap.allocate(4).expect("arena exhausted");
  }
  for hole in &holes {
    unsafe { heap.free(hole.as_ptr()) };
  }
  print_blocks("1: three holes", &heap);

  // --------------------------------------------------------------------
  // 2) Ask for 25 bytes (rounded to 28). Which hole is picked depends on
  //    the strategy.
  // --------------------------------------------------------------------
  let picked = heap.allocate(25).expect("arena exhausted");
  let hole = holes.iter().position(|&hole| hole == picked);
  println!("\n[2] allocate(25) -> {:?} (hole {hole:?})", picked);
  print_blocks("2: after allocate(25)", &heap);

  // --------------------------------------------------------------------
  // 3) Zeroed allocation and growth through resize.
  // --------------------------------------------------------------------
  let zeroed = heap.zero_allocate(8, 4).expect("arena exhausted");
  unsafe { ptr::write_bytes(zeroed.as_ptr(), 0xAB, 32) };
  let grown = unsafe { heap.resize(zeroed.as_ptr(), 128) }.expect("arena exhausted");
  println!(
    "\n[3] resize kept the first byte: 0x{:X}",
    unsafe { grown.as_ptr().read() }
  );
  print_blocks("3: after resize", &heap);

  // --------------------------------------------------------------------
  // 4) Release everything and watch the chain collapse.
  // --------------------------------------------------------------------
  unsafe {
    heap.free(picked.as_ptr());
    heap.free(grown.as_ptr());
  }
  print_blocks("4: after frees", &heap);

  heap.shutdown(&mut io::stdout().lock())?;
  Ok(())
}
